use std::ops::{ Add, Sub, Mul, Div, Neg };

use crate::internal::*;
use crate::Shape;
use crate::scalar::{ Inner, Numeric, Real };


/// The four arithmetic operators, with an optional right-hand side type.
///
/// Gets implemented automatically for all types that support them.

pub trait Arithmetic<Rhs = Self, Output = Self>:
  Add<Rhs, Output = Output> +
  Sub<Rhs, Output = Output> +
  Mul<Rhs, Output = Output> +
  Div<Rhs, Output = Output>
{}

impl<S, Rhs, Output> Arithmetic<Rhs, Output> for S
where
  S: Add<Rhs, Output = Output> + Sub<Rhs, Output = Output> +
     Mul<Rhs, Output = Output> + Div<Rhs, Output = Output>,
{}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn broadcast(&self, shape: &Shape) -> Self;
  fn reshape(&self, dims: &[usize]) -> Self;
  fn unsqueeze(&self, dim: isize) -> Self;
  fn select(&self, index: usize) -> Self;
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Numeric] inner types.
///
/// Reductions collapse every dimension from `dim` onward.

pub trait NumericOps<I: Numeric>: Arithmetic + Arithmetic<I, Self> + Sized {
  fn sum(&self, dim: isize) -> Self;
  fn max(&self, dim: isize) -> Self;
}


/// Differentiable mid-level operations.

pub trait RealOps<I: Real>: Neg<Output = Self> + Sized {
  fn exp(&self) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// the mid-level ones. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I>: BaseOps<I> + NumericOps<I> + RealOps<I>
where
  I: Real,
  for<'a> &'a Self: Arithmetic<&'a Self, Self> + Arithmetic<I, Self>,
{
  fn mean(&self, dim: isize) -> Self {
    let udim = negative_index(dim, self.shape().rank(), false);
    let n: usize = self.shape().dims[udim..].iter().product();
    let n: I = num_traits::NumCast::from(n).unwrap_or_else(I::nan);
    self.sum(dim) / n
  }

  /// Normalized exponentials over the last dimension.

  fn softmax(&self) -> Self {
    let exp = (self - &self.max(-1).unsqueeze(-1)).exp();
    &exp / &exp.sum(-1).unsqueeze(-1)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;
  use approx::assert_abs_diff_eq;

  #[test]
  fn mean() {
    let a = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]).trained();
    assert_eq!(a.mean(0).tensor(), &Tensor::scalar(3.5));
    assert_eq!(a.mean(-1).tensor(), &Tensor::vec(&[1.5, 3.5, 5.5]));
  }

  #[test]
  fn softmax() {
    let a = Tensor::new(&[3,2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).softmax();
    for total in a.sum(-1).to_vec() {
      assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(a.select(0).to_vec()[1], 1.0 / (1.0 + (-1.0f64).exp()), epsilon = 1e-12);
  }

  #[test]
  fn softmax_masked() {
    let a = Tensor::vec(&[0.0, f64::NEG_INFINITY, 0.0]).softmax();
    assert_eq!(a, Tensor::vec(&[0.5, 0.0, 0.5]));

    let b = Tensor::vec(&[f64::NEG_INFINITY; 3]).softmax();
    assert!(b.to_vec().iter().all(|p| p.is_nan() ));
  }

  #[test]
  fn softmax_large_logits() {
    let a = Tensor::vec(&[1000.0f32, 1000.0]).softmax();
    assert_eq!(a, Tensor::vec(&[0.5, 0.5]));
  }
}
