use rand::distributions::uniform::SampleUniform;
use num_traits::{ NumAssignOps, Num, NumCast, Float };


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + std::fmt::Debug + 'static {}
impl<T: PartialEq + Clone + Copy + std::fmt::Debug + 'static> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// Floating point types that gradients, probabilities and samples
/// can be computed for.

pub trait Real: Numeric + Float + SampleUniform + Default + std::fmt::Display
  + for<'a> std::ops::AddAssign<&'a Self> {}

impl<T> Real for T
where
  T: Numeric + Float + SampleUniform + Default + std::fmt::Display
    + for<'a> std::ops::AddAssign<&'a T>,
{}
