use std::rc::Rc;
use std::cell::{ Ref, RefCell };

use itertools::Itertools;
use rand::{ Rng, distributions::{ Distribution, WeightedIndex } };
use serde::{ Serialize, Deserialize };

mod lops;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Numeric, Real },
  ops::{ BaseOps, Hops },
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// arithmetic is only available for [Numeric] inner types and
/// sampling for [Real] ones.
///
/// Cloning a tensor, as well as broadcasting, reshaping or selecting
/// from it, shares the underlying storage.
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.shape.dims == rhs.shape.dims &&
      self.param_iter().zip(rhs.param_iter()).all(|(a, b)| a == b )
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  /// Stack equally shaped tensors along a new leading axis.

  pub fn stack(tensors: &[Tensor<T>]) -> Self {
    let inner = tensors.first()
      .map(|first| first.shape.dims.clone() )
      .unwrap_or_default();
    for tensor in tensors {
      assert_eq!(tensor.shape.dims, inner, "Cannot stack {} with {}", tensor.shape, Shape::new(&inner));
    }
    let dims = [vec![tensors.len()], inner].concat();
    let data = tensors.iter()
      .flat_map(|tensor| tensor.to_vec() )
      .collect();
    Self::new(&dims, data)
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  /// Copy the logical elements out in row-major order.

  pub fn to_vec(&self) -> Vec<T> {
    self.param_iter().collect()
  }

  pub fn dims(&self) -> &[usize] {
    &self.shape.dims
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  pub fn contiguous(&self) -> Self {
    if self.shape.contiguous() {
      self.clone()
    } else {
      self.detach()
    }
  }

  /// Copy into fresh storage.

  pub fn detach(&self) -> Self {
    Self::new(&self.shape.dims, self.to_vec())
  }

  pub fn view(&self, dims: &[usize]) -> Self {
    Self { shape: self.shape.view(dims), data: self.data.clone() }
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1, "Can't extract item from non-scalar {}", self.shape);
    self.raw()[self.shape.offset]
  }

  pub fn zip<O, F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn(T, T) -> O,
  {
    let lhs = self.broadcast(&rhs.shape);
    let rhs = rhs.broadcast(&lhs.shape);
    let data: Vec<O> = lhs.param_iter()
      .zip(rhs.param_iter())
      .map(|(a, b)| cb(a, b) )
      .collect();
    Tensor::new(&lhs.shape.dims, data)
  }

  pub fn vectorize<O, F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.param_iter().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Reduce all dimensions from `dim` onward to a single value each.

  pub fn collapse<O, F>(&self, dim: isize, mut cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(&[T]) -> O,
  {
    let dim = negative_index(dim, self.rank(), false);
    let outer: usize = self.shape.dims[..dim].iter().product();
    let group: usize = self.shape.dims[dim..].iter().product();
    let values = self.to_vec();
    let data = (0..outer)
      .map(|i| cb(&values[i * group..(i + 1) * group]) )
      .collect();
    Tensor::new(&self.shape.dims[..dim], data)
  }

  pub fn param_iter(&self) -> TensorIterator<T> {
    TensorIterator::new(self)
  }

  /// Write `other`, broadcast to this tensor's shape, through
  /// this tensor's view of its storage.

  pub(crate) fn op_assign(&self, other: &Self, cb: impl Fn(&mut T, T)) {
    let other = other.broadcast(&self.shape);
    assert_eq!(other.shape.dims, self.shape.dims,
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    // Collect first, as both may share storage
    let values = other.to_vec();
    let mut data = self.data.borrow_mut();
    for (i, value) in self.shape.iter().zip(values) {
      cb(&mut data[i], value);
    }
  }

  pub fn assign(&self, other: &Self) {
    self.op_assign(other, |a, b| *a = b );
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn zeros(shape: &[usize]) -> Self {
    Self::new(shape, vec![T::zero(); shape.iter().product()])
  }

  pub fn refill(&self, filler: T) {
    self.assign(&Self::scalar(filler));
  }

  /// Sum a broadcast tensor back down to `dims`.

  pub fn sum_to(&self, dims: &[usize]) -> Self {
    let target = Shape::new(dims).broadcast(&self.shape);
    assert_eq!(target.dims, self.shape.dims,
      "Cannot reduce {} to Shape{:?}", self.shape, dims);
    let mut data = vec![T::zero(); dims.iter().product()];
    for (i, value) in target.iter().zip(self.param_iter()) {
      data[i] += value;
    }
    Self::new(dims, data)
  }
}

impl<T: Real> Tensor<T> {
  pub fn randn<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
    let len: usize = shape.iter().product();
    let mut data = Vec::with_capacity(len + 1);
    while data.len() < len {
      let (a, b) = randn(rng);
      data.push(a);
      data.push(b);
    }
    data.truncate(len);
    Self::new(shape, data)
  }

  /// Draw one category index per row of (unnormalized) probabilities
  /// along the last dimension.
  ///
  /// Rows that form no valid distribution, such as all-NaN or all-zero
  /// ones, yield their last index.

  pub fn sample_categorical<R: Rng>(&self, rng: &mut R) -> Tensor<usize> {
    assert!(self.rank() > 0 && self.shape[-1] > 0,
      "Cannot sample categories from {}", self.shape);
    self.collapse(-1, |probs| {
      let last = probs.len() - 1;
      // Non-finite weights would break the uniform range
      if probs.iter().any(|p| !p.is_finite() ) { return last }
      WeightedIndex::<T>::new(probs)
        .map(|dist| dist.sample(&mut *rng) )
        .unwrap_or(last)
    })
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl Tensor<usize> {
  /// Expand category indices into a trailing one-hot dimension.

  pub fn one_hot<O: Numeric>(&self, size: usize) -> Tensor<O> {
    let mut data = vec![O::zero(); self.size() * size];
    for (row, index) in self.param_iter().enumerate() {
      assert!(index < size, "Category {index} out of range for {size} classes");
      data[row * size + index] = O::one();
    }
    let dims = [self.shape.dims.clone(), vec![size]].concat();
    Tensor::new(&dims, data)
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let values = self.param_iter().map(|value| format!("{value:?}") ).join(", ");
    write!(f, "Tensor{:?} [{values}]", self.shape.dims)
  }
}


pub struct TensorIterator<'a, T: Inner> {
  data: Ref<'a, Vec<T>>,
  shape_iter: Box<dyn Iterator<Item=usize> + 'a>,
}

impl<'a, T: Inner> TensorIterator<'a, T> {
  fn new(tensor: &'a Tensor<T>) -> Self {
    Self {
      data: tensor.data.borrow(),
      shape_iter: tensor.shape.iter(),
    }
  }
}

impl<T: Inner> Iterator for TensorIterator<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.shape_iter.next().map(|i| self.data[i] )
  }
}
