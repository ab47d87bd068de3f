use thiserror::Error;


/// Errors raised at the public boundary of the estimators.
///
/// Inner forward and backward procedures never fail; everything is
/// validated before a graph node gets created.

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
  #[error("Invalid argument in operation '{operation}': {reason}")]
  InvalidArgument {
    operation: &'static str,
    reason: String,
  },

  #[error("Invalid shape in operation '{operation}': {reason}")]
  InvalidShape {
    operation: &'static str,
    reason: String,
  },
}

impl Error {
  pub fn invalid_argument(operation: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidArgument { operation, reason: reason.into() }
  }

  pub fn invalid_shape(operation: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidShape { operation, reason: reason.into() }
  }

  pub fn operation(&self) -> &'static str {
    match self {
      Self::InvalidArgument { operation, .. } => operation,
      Self::InvalidShape { operation, .. } => operation,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
