use serde::{ Serialize, Deserialize };

use crate::{
  error::Result,
  estimator::EstimatorKind,
};


/// Settings for a [Sampler](crate::Sampler).
///
/// Missing fields fall back to their [Default] values when deserializing,
/// so a config only needs to name what it changes.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
  pub kind: EstimatorKind,
  pub tau: f64,
  pub seed: Option<u64>,
}

impl Default for EstimatorConfig {
  fn default() -> Self {
    Self {
      kind: EstimatorKind::ReinMax,
      tau: 1.0,
      seed: None,
    }
  }
}

impl EstimatorConfig {
  pub fn reinmax(tau: f64) -> Self {
    Self { kind: EstimatorKind::ReinMax, tau, ..Default::default() }
  }

  pub fn straight_through(tau: f64) -> Self {
    Self { kind: EstimatorKind::StraightThrough, tau, ..Default::default() }
  }

  pub fn with_seed(self, seed: u64) -> Self {
    Self { seed: Some(seed), ..self }
  }

  pub fn validate(&self) -> Result<()> {
    self.kind.validate_tau(self.tau)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn defaults() {
    let config = EstimatorConfig::default();
    assert_eq!(config.kind, EstimatorKind::ReinMax);
    assert_eq!(config.tau, 1.0);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn validation() {
    let err = EstimatorConfig::reinmax(0.5).validate().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert_eq!(err.operation(), "reinmax");
    assert!(EstimatorConfig::straight_through(0.5).validate().is_ok());
    assert!(EstimatorConfig::straight_through(-1.0).validate().is_err());
  }

  #[test]
  fn builder() {
    let config = EstimatorConfig::straight_through(0.7).with_seed(3);
    assert_eq!(config.seed, Some(3));
    assert_eq!(config.kind, EstimatorKind::StraightThrough);
  }
}
