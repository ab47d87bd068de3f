use rand::{ SeedableRng, rngs::StdRng };
use tracing::debug;

use crate::{
  error::Result,
  scalar::Real,
  variable::Variable,
  config::EstimatorConfig,
  estimator::sample_with_rng,
};


/// Draws differentiable one-hot samples with a fixed estimator and
/// its own random number generator.
///
/// A seeded config makes every sequence of draws reproducible.

#[derive(Debug, Clone)]
pub struct Sampler {
  config: EstimatorConfig,
  rng: StdRng,
}

impl Sampler {
  pub fn new(config: EstimatorConfig) -> Result<Self> {
    config.validate()?;
    let rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    debug!(estimator = config.kind.name(), tau = config.tau, seed = ?config.seed, "Created sampler");
    Ok(Self { config, rng })
  }

  pub fn config(&self) -> &EstimatorConfig {
    &self.config
  }

  /// Change the temperature for subsequent draws.

  pub fn set_tau(&mut self, tau: f64) -> Result<()> {
    self.config.kind.validate_tau(tau)?;
    debug!(estimator = self.config.kind.name(), from = self.config.tau, to = tau, "Changed temperature");
    self.config.tau = tau;
    Ok(())
  }

  /// Draw `(y_hard, y_soft)` for `logits`.

  pub fn sample<T: Real>(&mut self, logits: &Variable<T>) -> Result<(Variable<T>, Variable<T>)> {
    sample_with_rng(self.config.kind, logits, self.config.tau, &mut self.rng)
  }
}
