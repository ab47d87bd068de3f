use reinmax::{ ops::*, Tensor, Sampler, EstimatorConfig, Result };
use tracing::info;

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .init();

  // One row of trainable logits over four categories
  let theta = Tensor::new(&[1, 4], vec![0.0; 4]).trained();

  // Category 2 is the cheap one
  let cost = Tensor::new(&[1, 4], vec![1.0, 1.0, 0.0, 1.0]).tracked();

  let mut sampler = Sampler::new(EstimatorConfig::reinmax(2.0).with_seed(1))?;
  let learning_rate = 0.5;

  for step in 0..300 {
    // Cool down towards the lowest temperature ReinMax accepts
    if step == 150 {
      sampler.set_tau(1.0)?;
    }

    // Draw a sample and compute its cost
    let (y_hard, _) = sampler.sample(&theta)?;
    let loss = (&y_hard * &cost).sum(0);

    // Back-prop through the estimator
    loss.backward();

    // Gradient descent on the logits
    for mut param in loss.parameters() {
      let update = param.grad().unwrap() * learning_rate;
      param -= update;
    }

    if step % 50 == 0 {
      info!(step, loss = loss.item(), probs = %theta.tensor().softmax(), "Training");
    }

    // Reset gradients
    loss.reset();
  }

  println!("Learned distribution: {}", theta.tensor().softmax());
  Ok(())
}
