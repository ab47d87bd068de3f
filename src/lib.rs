//! Differentiable one-hot categorical sampling.
//! Tiny. Few dependencies. CPU only.
//!
//! Drawing a discrete sample is not differentiable, so training through one
//! requires a gradient estimator. This crate provides two of them on top of a
//! small reverse-mode autodiff core:
//!
//! - **ReinMax**: Approximates the gradient with a second-order correction
//! of the straight-through estimator. Requires a temperature of at least one.
//!
//! - **Straight-through**: The classic first-order estimator, differentiating
//! a tempered softmax in place of the sample.
//!
//! Both produce a one-hot sample `y_hard` on the forward pass, together with
//! the probabilities `y_soft` it got drawn from. Either output may be used in a
//! loss, and gradients from both flow back into the logits.
//!
//! # Features
//!
//! - **Broadcasting**: Tensors with differing but compatible shapes get
//! broadcasted to matching dimensions automatically for arithmetic operations.
//!
//! - **Zero-copy views**: Tensors may be selected from, reshaped and
//! broadcasted without copying any data in most situations.
//!
//! - **Custom operations**: Anything implementing [UnaryOp] or [BinaryOp]
//! can be recorded in a computation graph, along with state it captured
//! on the forward pass.
//!
//! # Examples
//!
//! Sampling and back-propagating a cost:
//! ```
//! use reinmax::{ ops::*, Tensor, reinmax };
//!
//! // Unnormalized log-probabilities over three categories
//! let logits = Tensor::vec(&[0.5f64, -1.0, 2.0]).trained();
//!
//! // Draw a one-hot sample
//! let (y_hard, y_soft) = reinmax(&logits, 1.0)?;
//! assert_eq!(y_hard.sum(0).item(), 1.0);
//! assert!((y_soft.sum(0).item() - 1.0).abs() < 1e-12);
//!
//! // Back-prop a cost through the sample
//! let cost = Tensor::vec(&[1.0, 1.0, 0.0]).tracked();
//! (&y_hard * &cost).sum(0).backward();
//! assert!(logits.grad().unwrap().sum(0).item().abs() < 1e-12);
//! # Ok::<(), reinmax::Error>(())
//! ```
//!
//! A [Sampler] bundles estimator, temperature and random number generator:
//! ```
//! use reinmax::{ Tensor, Sampler, EstimatorConfig };
//!
//! let mut sampler = Sampler::new(EstimatorConfig::reinmax(2.0).with_seed(7))?;
//! let logits = Tensor::new(&[4, 3], vec![0.0; 12]).trained();
//! let (y_hard, _) = sampler.sample(&logits)?;
//! assert_eq!(y_hard.dims(), &[4, 3]);
//! # Ok::<(), reinmax::Error>(())
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for a full training loop.

mod internal;
mod shape;
mod tensor;
mod variable;
mod error;
mod config;
mod estimator;
mod sampler;

pub mod ops;
pub mod scalar;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, UnaryOp, BinaryOp };
pub use error::{ Error, Result };
pub use config::EstimatorConfig;
pub use estimator::{
  EstimatorKind,
  SampleContext,
  Gradients,
  reinmax,
  reinmax_with_rng,
  straight_through,
  straight_through_with_rng,
};
pub use sampler::Sampler;
