use crate::{
  shape::Shape,
  tensor::Tensor,
  scalar::{ Inner, Numeric, Real },
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Inner> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    Self {
      shape: self.shape.broadcast(shape),
      data: self.data.clone(),
    }
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    self.contiguous().view(dims)
  }

  fn unsqueeze(&self, dim: isize) -> Self {
    Self {
      shape: self.shape.unsqueeze(dim),
      data: self.data.clone(),
    }
  }

  fn select(&self, index: usize) -> Self {
    Self {
      shape: self.shape.take(index),
      data: self.data.clone(),
    }
  }
}

impl<T: Numeric> NumericOps<T> for Tensor<T> {
  fn sum(&self, dim: isize) -> Self {
    self.collapse(dim, |values| values.iter().copied().sum() )
  }

  fn max(&self, dim: isize) -> Self {
    // NaN never compares greater, so it only survives in all-NaN groups
    self.collapse(dim, |values| {
      values.iter()
        .copied()
        .reduce(|max, value| if value > max { value } else { max } )
        .unwrap_or_else(T::zero)
    })
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }
}

impl<T: Real> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

impl<T: Real> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($trait:ident, $meth:ident, $symbol:tt) => {
    impl<T: Numeric> std::ops::$trait for &Tensor<T> { // &tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.zip(rhs, |a, b| a $symbol b )
      }
    }

    impl<T: Numeric> std::ops::$trait for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);
