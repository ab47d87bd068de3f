use itertools::Itertools;
use serde::{ Serialize, Deserialize };

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Besides its dimensions, a shape carries the strides and offset used to
/// address shared storage, which lets broadcasts, reshapes and slices
/// along the leading axis work without copying any data.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
  pub(crate) strides: Vec<isize>,
  pub(crate) offset: usize,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self {
      dims: dims.to_vec(),
      strides: Self::make_strides(dims),
      offset: 0,
    }
  }

  fn make_strides(dims: &[usize]) -> Vec<isize> {
    let mut strides = vec![1; dims.len()];
    for i in (1..dims.len()).rev() {
      strides[i - 1] = dims[i] as isize * strides[i];
    }
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  /// Number of rows when all but the last dimension get flattened.

  pub fn rows(&self) -> usize {
    self.dims[..self.rank().saturating_sub(1)].iter().product()
  }

  pub fn contiguous(&self) -> bool {
    self.strides == Self::make_strides(&self.dims)
  }

  pub fn iter(&self) -> Box<dyn Iterator<Item=usize> + '_> {
    if self.contiguous() {
      Box::new(self.offset..self.offset + self.size())
    } else {
      Box::new(ShapeIterator::new(self))
    }
  }

  pub fn view(&self, dims: &[usize]) -> Self {
    assert!(self.contiguous(), "Cannot view non-contiguous {}", self);
    assert_eq!(self.size(), dims.iter().product::<usize>(),
      "Cannot view {} as Shape{:?}", self, dims);
    Self {
      dims: dims.to_vec(),
      strides: Self::make_strides(dims),
      offset: self.offset,
    }
  }

  /// Select a single index along the leading axis.

  pub fn take(&self, index: usize) -> Self {
    assert!(self.rank() > 0 && index < self.dims[0],
      "Index {index} out of bounds for {}", self);
    Self {
      dims: self.dims[1..].to_vec(),
      strides: self.strides[1..].to_vec(),
      offset: (self.offset as isize + index as isize * self.strides[0]) as usize,
    }
  }

  pub fn unsqueeze(&self, dim: isize) -> Self {
    let d = negative_index(dim, self.rank(), true);
    let mut shape = self.clone();
    let stride = if d < shape.rank() {
      shape.strides[d] * shape.dims[d] as isize
    } else { 1 };
    shape.strides.insert(d, stride);
    shape.dims.insert(d, 1);
    shape
  }

  /// Expand to the common shape of `self` and `other`, using zero strides
  /// for repeated dimensions.

  pub fn broadcast(&self, other: &Self) -> Self {
    let rank = self.rank().max(other.rank());
    let mut dims = vec![0; rank];
    let mut strides = vec![0; rank];
    for i in 0..rank {
      let own = (i < self.rank()).then(|| self.rank() - 1 - i );
      let dl = own.map_or(1, |j| self.dims[j] );
      let dr = if i < other.rank() { other.dims[other.rank() - 1 - i] } else { 1 };
      assert!(dl == dr || dl == 1 || dr == 1, "Could not broadcast {} & {}", self, other);
      let d = rank - 1 - i;
      dims[d] = if dl == 1 { dr } else { dl };
      strides[d] = match own {
        Some(j) if !(dl == 1 && dr != 1) => self.strides[j],
        _ => 0,
      };
    }
    Self { dims, strides, offset: self.offset }
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape[{}]", self.dims.iter().join(", "))
  }
}


/// Walk a strided [Shape]'s storage indices in row-major order.

pub struct ShapeIterator<'a> {
  shape: &'a Shape,
  counter: Vec<usize>,
  remaining: usize,
}

impl<'a> ShapeIterator<'a> {
  fn new(shape: &'a Shape) -> Self {
    Self {
      counter: vec![0; shape.rank()],
      remaining: shape.size(),
      shape,
    }
  }
}

impl Iterator for ShapeIterator<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 { return None }
    self.remaining -= 1;
    let index = self.counter.iter()
      .zip(&self.shape.strides)
      .map(|(&c, &s)| c as isize * s )
      .sum::<isize>() + self.shape.offset as isize;
    // Carry from the innermost dimension outward
    for d in (0..self.counter.len()).rev() {
      self.counter[d] += 1;
      if self.counter[d] < self.shape.dims[d] { break }
      self.counter[d] = 0;
    }
    Some(index as usize)
  }
}
