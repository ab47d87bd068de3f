//! Gradient estimators for one-hot categorical samples.
//!
//! Both estimators draw `y_hard ~ Categorical(softmax(logits))` on the forward
//! pass and differ only in the gradient they report for it on the backward
//! pass. [ReinMax](reinmax) corrects the first-order
//! [straight-through](straight_through) estimate with a second-order term built
//! from the average of the sample and a tempered softmax.

use rand::Rng;
use serde::{ Serialize, Deserialize };
use tracing::trace;

use crate::{
  error::{ Error, Result },
  scalar::Real,
  tensor::Tensor,
  variable::{ Variable, UnaryOp },
  ops::{ BaseOps, NumericOps, Hops },
};


/// Which backward rule a sample gets differentiated with.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
  ReinMax,
  StraightThrough,
}

impl EstimatorKind {
  pub fn name(&self) -> &'static str {
    match self {
      Self::ReinMax => "reinmax",
      Self::StraightThrough => "straight_through",
    }
  }

  /// Check a temperature against this estimator's requirements.

  pub fn validate_tau(&self, tau: f64) -> Result<()> {
    match self {
      Self::ReinMax if !(tau >= 1.0) => Err(Error::invalid_argument(self.name(),
        format!("ReinMax requires the temperature tau >= 1, got {tau}"))),
      Self::StraightThrough if !(tau > 0.0 && tau.is_finite()) => Err(Error::invalid_argument(self.name(),
        format!("Straight-through requires a positive, finite temperature tau, got {tau}"))),
      _ => Ok(()),
    }
  }
}


/// Gradients reported by a backward pass.
///
/// The temperature is a hyperparameter and never receives a gradient.

#[derive(Debug, Clone, PartialEq)]
pub struct Gradients<T: Real> {
  pub logits: Tensor<T>,
  pub tau: Option<Tensor<T>>,
}


/// State saved by one forward pass for its matching backward pass.
///
/// The sample and soft distribution are the forward pass's own tensors,
/// never recomputed. Logits get copied, so later in-place updates of a
/// parameter leave the context consistent. Every forward pass creates a
/// fresh context.

#[derive(Debug, Clone)]
pub struct SampleContext<T: Real> {
  kind: EstimatorKind,
  one_hot_sample: Tensor<T>,
  logits: Tensor<T>,
  y_soft: Tensor<T>,
  tau: T,
}

impl<T: Real> SampleContext<T> {
  /// Draw one category per row of `[N, K]` logits.
  ///
  /// Returns `(one_hot_sample, y_soft, context)`.

  pub fn forward<R: Rng>(kind: EstimatorKind, logits: &Tensor<T>, tau: T, rng: &mut R) -> (Tensor<T>, Tensor<T>, Self) {
    let y_soft = logits.softmax();
    let sample = y_soft.sample_categorical(rng);
    let one_hot_sample = sample.one_hot::<T>(logits.shape()[-1]);
    trace!(estimator = kind.name(), dims = ?logits.dims(), %tau, "Drew categorical sample");
    let context = Self {
      kind,
      one_hot_sample: one_hot_sample.clone(),
      logits: logits.detach(),
      y_soft: y_soft.clone(),
      tau,
    };
    (one_hot_sample, y_soft, context)
  }

  pub fn kind(&self) -> EstimatorKind {
    self.kind
  }

  pub fn one_hot_sample(&self) -> &Tensor<T> {
    &self.one_hot_sample
  }

  pub fn logits(&self) -> &Tensor<T> {
    &self.logits
  }

  pub fn y_soft(&self) -> &Tensor<T> {
    &self.y_soft
  }

  pub fn tau(&self) -> T {
    self.tau
  }

  /// Map gradients at the one-hot sample and at the soft distribution
  /// to a gradient at the logits.

  pub fn backward(&self, grad_at_sample: &Tensor<T>, grad_at_p: &Tensor<T>) -> Gradients<T> {
    trace!(estimator = self.kind.name(), dims = ?self.logits.dims(), "Estimating logits gradient");
    let logits = match self.kind {
      EstimatorKind::ReinMax => self.reinmax_backward(grad_at_sample, grad_at_p),
      EstimatorKind::StraightThrough => self.straight_through_backward(grad_at_sample, grad_at_p),
    };
    Gradients { logits, tau: None }
  }

  fn reinmax_backward(&self, grad_at_sample: &Tensor<T>, grad_at_p: &Tensor<T>) -> Tensor<T> {
    let two = T::one() + T::one();
    let half = T::one() / two;

    let shifted_y_soft = ((&self.logits / self.tau).softmax() + &self.one_hot_sample) * half;
    let grad_input_1 = (grad_at_sample * two) * &shifted_y_soft;
    let grad_input_1 = &grad_input_1 - &shifted_y_soft * grad_input_1.sum(-1).unsqueeze(-1);

    let grad_input_0 = (grad_at_sample * -half + grad_at_p) * &self.y_soft;
    let grad_input_0 = &grad_input_0 - &self.y_soft * grad_input_0.sum(-1).unsqueeze(-1);

    let grad_input = grad_input_0 + grad_input_1;
    &grad_input - grad_input.mean(-1).unsqueeze(-1)
  }

  fn straight_through_backward(&self, grad_at_sample: &Tensor<T>, grad_at_p: &Tensor<T>) -> Tensor<T> {
    let y_tau = (&self.logits / self.tau).softmax();
    let grad_input_1 = grad_at_sample * &y_tau;
    let grad_input_1 = (&grad_input_1 - &y_tau * grad_input_1.sum(-1).unsqueeze(-1)) / self.tau;

    let grad_input_0 = grad_at_p * &self.y_soft;
    let grad_input_0 = &grad_input_0 - &self.y_soft * grad_input_0.sum(-1).unsqueeze(-1);

    grad_input_0 + grad_input_1
  }
}


/// Graph node for a sampled estimator.
///
/// Its output stacks `[one_hot_sample, y_soft]` along a new leading axis, so
/// the gradient it receives holds `grad_at_sample` and `grad_at_p` as slices.

#[derive(Debug)]
struct CategoricalSample<T: Real> {
  context: SampleContext<T>,
}

impl<T: Real> UnaryOp<T> for CategoricalSample<T> {
  fn run(&self, _logits: &Tensor<T>) -> Tensor<T> {
    Tensor::stack(&[self.context.one_hot_sample.clone(), self.context.y_soft.clone()])
  }

  fn derive(&self, _logits: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    self.context.backward(&grad.select(0), &grad.select(1)).logits
  }
}


/// Draw a one-hot categorical sample from `softmax(logits)` along the last
/// dimension, differentiated with the ReinMax estimator.
///
/// `logits` may have any number of leading dimensions. Returns
/// `(y_hard, y_soft)`, both shaped like `logits` and both differentiable.
/// Fails with [Error::InvalidArgument] if `tau < 1`.
///
/// Rows consisting entirely of `-inf` are not checked and yield NaN.

pub fn reinmax<T: Real>(logits: &Variable<T>, tau: f64) -> Result<(Variable<T>, Variable<T>)> {
  reinmax_with_rng(logits, tau, &mut rand::thread_rng())
}

/// [reinmax] with a caller-supplied random number generator.

pub fn reinmax_with_rng<T: Real, R: Rng>(logits: &Variable<T>, tau: f64, rng: &mut R) -> Result<(Variable<T>, Variable<T>)> {
  sample_with_rng(EstimatorKind::ReinMax, logits, tau, rng)
}

/// Draw a one-hot categorical sample, differentiated with the
/// straight-through estimator of `softmax(logits / tau)`.
///
/// Takes the same arguments and returns the same outputs as [reinmax], but
/// accepts any positive temperature.

pub fn straight_through<T: Real>(logits: &Variable<T>, tau: f64) -> Result<(Variable<T>, Variable<T>)> {
  straight_through_with_rng(logits, tau, &mut rand::thread_rng())
}

/// [straight_through] with a caller-supplied random number generator.

pub fn straight_through_with_rng<T: Real, R: Rng>(logits: &Variable<T>, tau: f64, rng: &mut R) -> Result<(Variable<T>, Variable<T>)> {
  sample_with_rng(EstimatorKind::StraightThrough, logits, tau, rng)
}

pub(crate) fn sample_with_rng<T: Real, R: Rng>(
  kind: EstimatorKind,
  logits: &Variable<T>,
  tau: f64,
  rng: &mut R,
) -> Result<(Variable<T>, Variable<T>)> {
  kind.validate_tau(tau)?;
  let tau: T = num_traits::NumCast::from(tau)
    .ok_or_else(|| Error::invalid_argument(kind.name(), format!("Temperature {tau} is not representable")) )?;

  let dims = logits.shape().dims.clone();
  let categories = match dims.last() {
    Some(&k) if k > 0 => k,
    _ => return Err(Error::invalid_shape(kind.name(),
      format!("Logits need a non-empty last dimension of categories, got {}", logits.shape()))),
  };

  let flat = logits.reshape(&[logits.shape().rows(), categories]);
  let (_, _, context) = SampleContext::forward(kind, flat.tensor(), tau, rng);
  let outputs = flat.unary_op(CategoricalSample { context });

  Ok((outputs.select(0).reshape(&dims), outputs.select(1).reshape(&dims)))
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;
  use rand::{ SeedableRng, rngs::StdRng };

  fn context(kind: EstimatorKind, logits: Tensor<f64>, sample: &[usize], tau: f64) -> SampleContext<f64> {
    let y_soft = logits.softmax();
    let one_hot_sample = Tensor::vec(sample).one_hot(logits.shape()[-1]);
    SampleContext { kind, one_hot_sample, logits, y_soft, tau }
  }

  fn assert_close(actual: &Tensor<f64>, expected: &[f64]) {
    assert_eq!(actual.size(), expected.len());
    for (a, e) in actual.to_vec().iter().zip(expected) {
      assert_abs_diff_eq!(a, e, epsilon = 1e-12);
    }
  }

  #[test]
  fn uniform_logits() {
    let logits = Tensor::new(&[1,3], vec![0.0; 3]);
    let upstream = Tensor::new(&[1,3], vec![1.0, 0.0, 0.0]);
    let zeros = Tensor::zeros(&[1,3]);

    let grads = context(EstimatorKind::ReinMax, logits.clone(), &[0], 1.0).backward(&upstream, &zeros);
    assert_close(&grads.logits, &[1.0 / 3.0, -1.0 / 6.0, -1.0 / 6.0]);
    assert_eq!(grads.tau, None);

    let grads = context(EstimatorKind::ReinMax, logits, &[1], 1.0).backward(&upstream, &zeros);
    assert_close(&grads.logits, &[1.0 / 6.0, -1.0 / 6.0, 0.0]);
  }

  #[test]
  fn tempered_logits() {
    let logits = Tensor::new(&[1,3], vec![1.0, 2.0, 0.5]);
    let grad_at_sample = Tensor::new(&[1,3], vec![0.3, -1.0, 2.0]);
    let grad_at_p = Tensor::new(&[1,3], vec![0.5, 0.0, -0.5]);
    let grads = context(EstimatorKind::ReinMax, logits, &[1], 2.0).backward(&grad_at_sample, &grad_at_p);
    assert_close(&grads.logits, &[0.26270645929551617, -0.5875446555890838, 0.3248381962935676]);
  }

  #[test]
  fn zero_mean_rows() {
    let mut rng = StdRng::seed_from_u64(21);
    let logits = Tensor::<f64>::randn(&[6, 5], &mut rng);
    let (_, _, context) = SampleContext::forward(EstimatorKind::ReinMax, &logits, 1.5, &mut rng);
    let grads = context.backward(&Tensor::randn(&[6, 5], &mut rng), &Tensor::randn(&[6, 5], &mut rng));
    for total in grads.logits.sum(-1).to_vec() {
      assert_abs_diff_eq!(total, 0.0, epsilon = 1e-12);
    }
    assert!(grads.tau.is_none());
  }

  #[test]
  fn soft_path_is_exact_softmax_gradient() {
    let mut rng = StdRng::seed_from_u64(4);
    let logits = Tensor::<f64>::randn(&[3, 4], &mut rng);
    let grad_at_p = Tensor::<f64>::randn(&[3, 4], &mut rng);
    let input = logits.trained();
    (input.softmax() * grad_at_p.tracked()).sum(0).backward();
    let expected = input.grad().unwrap();

    for kind in [EstimatorKind::ReinMax, EstimatorKind::StraightThrough] {
      let (_, _, context) = SampleContext::forward(kind, &logits, 2.0, &mut rng);
      let grads = context.backward(&Tensor::zeros(&[3, 4]), &grad_at_p);
      assert_close(&grads.logits, &expected.to_vec());
    }
  }

  #[test]
  fn straight_through_uses_tempered_jacobian() {
    let logits = Tensor::new(&[1,2], vec![0.0, 0.0]);
    let upstream = Tensor::new(&[1,2], vec![1.0, 0.0]);
    let grads = context(EstimatorKind::StraightThrough, logits, &[1], 2.0)
      .backward(&upstream, &Tensor::zeros(&[1,2]));
    // p = [0.5, 0.5]: (0.5 - 0.25) / 2
    assert_close(&grads.logits, &[0.125, -0.125]);
  }

  #[test]
  fn translation_invariance() {
    let logits = Tensor::new(&[2,3], vec![0.5, -1.0, 2.0, 0.0, 1.0, -3.0]);
    let shifted = &logits + 7.5;
    let grad_at_sample = Tensor::new(&[2,3], vec![1.0, 0.0, -1.0, 0.5, 0.5, 2.0]);
    let grad_at_p = Tensor::new(&[2,3], vec![0.0, 1.0, 0.0, -1.0, 0.0, 0.0]);

    let (hard_a, soft_a, context_a) = SampleContext::forward(EstimatorKind::ReinMax, &logits, 1.0, &mut StdRng::seed_from_u64(8));
    let (hard_b, soft_b, context_b) = SampleContext::forward(EstimatorKind::ReinMax, &shifted, 1.0, &mut StdRng::seed_from_u64(8));
    assert_eq!(hard_a, hard_b);
    assert_close(&soft_b, &soft_a.to_vec());

    let grads_a = context_a.backward(&grad_at_sample, &grad_at_p);
    let grads_b = context_b.backward(&grad_at_sample, &grad_at_p);
    assert_close(&grads_b.logits, &grads_a.logits.to_vec());
  }

  #[test]
  fn context_shares_forward_tensors() {
    let logits = Tensor::new(&[2,2], vec![0.0, 1.0, 1.0, 0.0]);
    let (hard, soft, context) = SampleContext::forward(EstimatorKind::ReinMax, &logits, 1.0, &mut StdRng::seed_from_u64(1));
    assert_eq!(context.logits(), &logits);
    assert!(!context.logits().shared_with(&logits));
    assert!(context.one_hot_sample().shared_with(&hard));
    assert!(context.y_soft().shared_with(&soft));
    assert_eq!(context.tau(), 1.0);
    assert_eq!(context.kind(), EstimatorKind::ReinMax);
  }

  #[test]
  fn validates_temperature() {
    assert!(EstimatorKind::ReinMax.validate_tau(1.0).is_ok());
    assert!(EstimatorKind::ReinMax.validate_tau(0.999).is_err());
    assert!(EstimatorKind::ReinMax.validate_tau(f64::NAN).is_err());
    assert!(EstimatorKind::StraightThrough.validate_tau(0.1).is_ok());
    assert!(EstimatorKind::StraightThrough.validate_tau(0.0).is_err());
    assert!(EstimatorKind::StraightThrough.validate_tau(f64::INFINITY).is_err());
  }

  #[test]
  fn rejects_scalar_logits() {
    let logits = Tensor::scalar(1.0).trained();
    let err = reinmax(&logits, 1.0).unwrap_err();
    assert!(matches!(err, Error::InvalidShape { operation: "reinmax", .. }));

    let logits = Tensor::<f64>::zeros(&[2, 0]).trained();
    assert!(straight_through(&logits, 1.0).is_err());
  }

  #[test]
  fn graph_gradient_matches_context() {
    let mut rng = StdRng::seed_from_u64(13);
    let logits = Tensor::<f64>::randn(&[2, 2, 3], &mut rng).trained();
    let grad_at_sample = Tensor::<f64>::randn(&[2, 2, 3], &mut rng);
    let grad_at_p = Tensor::<f64>::randn(&[2, 2, 3], &mut rng);

    let (y_hard, y_soft) = reinmax_with_rng(&logits, 1.5, &mut StdRng::seed_from_u64(99)).unwrap();
    let loss = (&y_hard * grad_at_sample.tracked()).sum(0) + (&y_soft * grad_at_p.tracked()).sum(0);
    loss.backward();

    let flat = logits.reshape(&[4, 3]);
    let (hard, _, context) = SampleContext::forward(EstimatorKind::ReinMax, flat.tensor(), 1.5, &mut StdRng::seed_from_u64(99));
    assert_eq!(hard.reshape(&[2, 2, 3]), *y_hard.tensor());
    let expected = context.backward(&grad_at_sample.reshape(&[4, 3]), &grad_at_p.reshape(&[4, 3]));
    assert_close(logits.grad().unwrap(), &expected.logits.to_vec());
  }
}
