use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  variable::{ Variable, BinaryOp, UnaryOp },
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Real> BaseOps<T> for Variable<T> {
  fn scalar(item: T) -> Self {
    Self::from_tensor(Tensor::scalar(item), false)
  }

  fn shape(&self) -> &Shape {
    self.node.data.shape()
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    let dims = self.shape().broadcast(shape).dims;
    if dims == self.shape().dims { return self.clone() }
    self.unary_op(Broadcast { dims })
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    if dims == self.shape().dims.as_slice() { return self.clone() }
    self.unary_op(Reshape { dims: dims.to_vec() })
  }

  fn unsqueeze(&self, dim: isize) -> Self {
    let shape = self.shape().unsqueeze(dim);
    self.reshape(&shape.dims)
  }

  fn select(&self, index: usize) -> Self {
    self.unary_op(Select { index })
  }
}

impl<T: Real> NumericOps<T> for Variable<T> {
  fn sum(&self, dim: isize) -> Self {
    self.unary_op(Sum { dim })
  }

  fn max(&self, dim: isize) -> Self {
    self.unary_op(Max { dim })
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn exp(&self) -> Self {
    self.unary_op(Exp)
  }
}

impl<T: Real> std::ops::Neg for &Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    self * -T::one()
  }
}

impl<T: Real> std::ops::Neg for Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$op for &Variable<T> { // &var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        let (lhs, rhs) = if self.shape().dims != rhs.shape().dims {
          (self.broadcast(rhs.shape()), rhs.broadcast(self.shape()))
        } else {
          (self.clone(), rhs.clone())
        };
        lhs.binary_op($op, &rhs)
      }
    }

    impl<T: Real> std::ops::$op for Variable<T> { // var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<Variable<T>> for &Variable<T> { // &var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Variable<T>) -> Variable<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<&Variable<T>> for Variable<T> { // var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: &Variable<T>) -> Variable<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$op<T> for &Variable<T> { // &var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        self $symbol &Variable::scalar(rhs)
      }
    }

    impl<T: Real> std::ops::$op<T> for Variable<T> { // var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        &self $symbol &Variable::scalar(rhs)
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


#[derive(Debug, Clone)]
pub struct Add;

impl<T: Real> BinaryOp<T> for Add {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs + rhs
  }

  fn derive(&self, _lhs: &Tensor<T>, _rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.clone(),
    grad.clone(),
  )}
}


#[derive(Debug, Clone)]
pub struct Sub;

impl<T: Real> BinaryOp<T> for Sub {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs - rhs
  }

  fn derive(&self, _lhs: &Tensor<T>, _rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.clone(),
    -grad,
  )}
}


#[derive(Debug, Clone)]
pub struct Mul;

impl<T: Real> BinaryOp<T> for Mul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs * rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad * rhs,
    grad * lhs,
  )}
}


#[derive(Debug, Clone)]
pub struct Div;

impl<T: Real> BinaryOp<T> for Div {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs / rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad / rhs,
    -grad * lhs / rhs / rhs,
  )}
}


#[derive(Debug, Clone)]
pub struct Broadcast {
  dims: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Broadcast {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.broadcast(&Shape::new(&self.dims))
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.sum_to(lhs.dims())
  }
}


#[derive(Debug, Clone)]
pub struct Reshape {
  dims: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Reshape {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.reshape(&self.dims)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.reshape(lhs.dims())
  }
}


#[derive(Debug, Clone)]
pub struct Select {
  index: usize,
}

impl<T: Real> UnaryOp<T> for Select {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.select(self.index)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let out = Tensor::zeros(lhs.dims());
    out.select(self.index).assign(grad);
    out
  }
}


#[derive(Debug, Clone)]
pub struct Sum {
  dim: isize,
}

impl<T: Real> UnaryOp<T> for Sum {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum(self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let kept = keep_dims(lhs.dims(), self.dim);
    grad.reshape(&kept).broadcast(lhs.shape()).detach()
  }
}


#[derive(Debug, Clone)]
pub struct Max {
  dim: isize,
}

impl<T: Real> UnaryOp<T> for Max {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.max(self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    // Ties share the full gradient
    let kept = keep_dims(lhs.dims(), self.dim);
    let max = lhs.max(self.dim).reshape(&kept);
    let mask = lhs.zip(&max, |a, b| if a == b { T::one() } else { T::zero() });
    mask * grad.reshape(&kept)
  }
}


#[derive(Debug, Clone)]
pub struct Exp;

impl<T: Real> UnaryOp<T> for Exp {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.exp()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * lhs.exp()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::Hops;

  #[test]
  fn reshape_roundtrip_gradient() {
    let x = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).trained();
    let y = x.reshape(&[3,2]).select(0).sum(0);
    y.backward();
    assert_eq!(x.grad(), Some(&Tensor::new(&[2,3], vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0])));
  }

  #[test]
  fn max_gradient() {
    let x = Tensor::new(&[2,3], vec![1.0, 4.0, 2.0, 3.0, 0.0, -1.0]).trained();
    x.max(-1).sum(0).backward();
    assert_eq!(x.grad(), Some(&Tensor::new(&[2,3], vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0])));
  }

  #[test]
  fn division_gradient() {
    let x = Tensor::vec(&[2.0, 4.0]).trained();
    let y = Tensor::vec(&[1.0, 2.0]).trained();
    (&x / &y).sum(0).backward();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[1.0, 0.5])));
    assert_eq!(y.grad(), Some(&Tensor::vec(&[-2.0, -1.0])));
  }

  #[test]
  fn softmax_rows_have_zero_gradient_sum() {
    let x = Tensor::<f64>::new(&[2,3], vec![0.5, -1.0, 2.0, 0.0, 0.0, 3.0]).trained();
    let w = Tensor::new(&[2,3], vec![1.0, -2.0, 0.5, 3.0, 0.0, 1.0]).tracked();
    (x.softmax() * w).sum(0).backward();
    for total in x.grad().unwrap().sum(-1).to_vec() {
      assert!(total.abs() < 1e-12);
    }
  }
}
