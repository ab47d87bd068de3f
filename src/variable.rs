use std::rc::Rc;
use std::collections::HashSet;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::fmt::Debug;

mod mops;

use crate::{
  tensor::Tensor,
  scalar::Real,
  ops::{ NumericOps, Hops },
};


pub fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Unary computational operation that can also compute its derivative.
///
/// Operations may carry state captured when they were created, such as
/// a drawn sample, that both [run](UnaryOp::run) and
/// [derive](UnaryOp::derive) rely on.

pub trait UnaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
}


/// Binary computational operation that can also compute its derivative.

pub trait BinaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>);
}


#[derive(Debug)]
enum Op<T: Real> {
  Unary(Box<dyn UnaryOp<T>>),
  Binary(Box<dyn BinaryOp<T>>),
}


/// Node in a computation graph, containing a [Variable]'s data and gradient,
/// as well as the operation used to create it.

#[derive(Debug)]
struct Node<T: Real> {
  id: usize,
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
  op: Option<Op<T>>,
  previous: Vec<Rc<Self>>,
  trainable: bool,
}

impl<T: Real> Node<T> {
  fn reset_gradient(&self, filler: T) {
    if let Some(grad) = &self.grad {
      grad.refill(filler);
    }
  }

  fn backward(&self) {
    if let (Some(op), Some(grad)) = (&self.op, &self.grad) {
      let lhs = &self.previous[0].data;
      let changes = match op {
        Op::Unary(op) => vec![op.derive(lhs, grad)],
        Op::Binary(op) => {
          let rhs = &self.previous[1].data;
          let (change_l, change_r) = op.derive(lhs, rhs, grad);
          vec![change_l, change_r]
        },
      };
      for (change, prev) in changes.iter().zip(self.previous.iter()) {
        if let Some(grad) = &prev.grad {
          grad.op_assign(change, |a, b| *a += b );
        }
      }
    }
  }
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any [Real] [Tensor].
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  node: Rc<Node<T>>,
}

impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.node.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.node.data == rhs.node.data
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(tensor: Tensor<T>, trainable: bool) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: trainable.then(|| Tensor::zeros(tensor.dims()) ),
        data: tensor,
        op: None,
        previous: vec![],
        trainable,
      }),
    }
  }

  fn operation(op: Op<T>, data: Tensor<T>, grad: bool, previous: Vec<Rc<Node<T>>>) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: grad.then(|| Tensor::zeros(data.dims()) ),
        data,
        op: Some(op),
        previous,
        trainable: false,
      }),
    }
  }

  pub fn id(&self) -> usize {
    self.node.id
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.node.data
  }

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.node.grad.as_ref()
  }

  pub fn unary_op(&self, op: impl UnaryOp<T> + 'static) -> Self {
    let data = op.run(&self.node.data);
    Self::operation(
      Op::Unary(Box::new(op)),
      data,
      self.grad().is_some(),
      vec![self.node.clone()],
    )
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.data, &rhs.node.data);
    Self::operation(
      Op::Binary(Box::new(op)),
      data,
      self.grad().is_some() || rhs.grad().is_some(),
      vec![self.node.clone(), rhs.node.clone()],
    )
  }

  /// Compute gradients across this Variable's entire graph, seeding
  /// every element of this Variable with a gradient of one.
  ///
  /// Gradients of inputs accumulate over repeated calls until [reset](Self::reset).

  pub fn backward(&self) {
    if self.grad().is_none() { panic!("Cannot compute gradients for constant {self}") }
    let history = self.history();
    for node in history.iter().filter(|node| node.op.is_some() ) {
      node.reset_gradient(T::zero());
    }
    self.node.reset_gradient(T::one());
    for node in history.iter().rev() {
      node.backward();
    }
  }

  /// List all trainable parameters in this Variable's graph.

  pub fn parameters(&self) -> Vec<Self> {
    self.history()
      .into_iter()
      .filter(|node| node.trainable )
      .map(|node| Self { node } )
      .collect()
  }

  /// Set gradients to zero for this Variable's entire graph.

  pub fn reset(&self) {
    for node in self.history() {
      node.reset_gradient(T::zero());
    }
  }

  fn history(&self) -> Vec<Rc<Node<T>>> {
    let mut history = vec![];
    Self::history_recurse(&self.node, &mut history, &mut HashSet::new());
    history
  }

  fn history_recurse(node: &Rc<Node<T>>, history: &mut Vec<Rc<Node<T>>>, visited: &mut HashSet<usize>) {
    if !visited.insert(node.id) { return }
    for prev in &node.previous {
      Self::history_recurse(prev, history, visited);
    }
    history.push(node.clone());
  }

  /// Compute a function's gradient with respect to `input` numerically,
  /// using central differences of width `eps`, and compare it to the
  /// automatically derived solution.
  ///
  /// Returns the mean absolute difference between both gradients.

  pub fn check_gradients<F>(input: &Tensor<T>, eps: T, generator: F) -> T
  where
    F: Fn(&Self) -> Self
  {
    let two = T::one() + T::one();
    let var = input.detach().trained();
    let output = generator(&var).sum(0);
    output.backward();
    let grad = var.grad().map(|grad| grad.to_vec() ).unwrap_or_default();

    let values = input.to_vec();
    let shifted = |i: usize, delta: T| {
      let mut values = values.clone();
      values[i] += delta;
      generator(&Tensor::new(input.dims(), values).tracked()).sum(0).item()
    };
    let total = grad.iter()
      .enumerate()
      .map(|(i, &g)| {
        let numeric = (shifted(i, eps) - shifted(i, -eps)) / (two * eps);
        (g - numeric).abs()
      })
      .fold(T::zero(), |acc, diff| acc + diff );
    let len: T = num_traits::NumCast::from(values.len()).unwrap_or_else(T::nan);
    total / len
  }
}

impl<T: Real> std::ops::SubAssign<Tensor<T>> for Variable<T> {
  fn sub_assign(&mut self, rhs: Tensor<T>) {
    self.node.data.op_assign(&rhs, |a, b| *a -= b );
  }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.node.trainable { "Trainable" } else {
      if self.node.grad.is_some() { "Computed" } else { "Tracked" }
    };
    write!(f, "{title} {}", self.tensor())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::ops::{ BaseOps, RealOps };

  #[test]
  fn x_squared() {
    let x = Tensor::vec(&[3.0, 5.0]).trained();
    let z = &x * &x + 2.0;
    z.backward();
    assert_eq!(z, Tensor::vec(&[11.0, 27.0]).tracked());
    assert_eq!(x.grad(), Some(&Tensor::vec(&[6.0, 10.0])));
  }

  #[test]
  fn broadcast_gradient() {
    let x = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).trained();
    let b = Tensor::new(&[2,1], vec![10.0, 20.0]).trained();
    let y = (&x * &b).sum(0);
    y.backward();
    assert_eq!(b.grad(), Some(&Tensor::new(&[2,1], vec![6.0, 15.0])));
    assert_eq!(x.grad(), Some(&Tensor::new(&[2,3], vec![10.0, 10.0, 10.0, 20.0, 20.0, 20.0])));
  }

  #[test]
  fn select_gradient() {
    let x = Tensor::new(&[2,2], vec![1.0, 2.0, 3.0, 4.0]).trained();
    let y = x.select(1) * 3.0;
    y.backward();
    assert_eq!(x.grad(), Some(&Tensor::new(&[2,2], vec![0.0, 0.0, 3.0, 3.0])));
  }

  #[test]
  fn reset() {
    let x = Tensor::vec(&[1.0, 2.0]).trained();
    let y = (&x * 2.0).sum(0);
    y.backward();
    y.backward();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[4.0, 4.0])));
    y.reset();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[0.0, 0.0])));
  }

  #[test]
  fn parameters() {
    let w = Tensor::vec(&[1.0, 2.0]).trained();
    let x = Tensor::vec(&[3.0, 4.0]).tracked();
    let y = (&w * &x).sum(0);
    let params = y.parameters();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].id(), w.id());
  }

  #[test]
  #[should_panic]
  fn constant_backward() {
    Tensor::vec(&[1.0, 2.0]).tracked().sum(0).backward();
  }

  #[test]
  fn softmax_gradient() {
    let mut rng = StdRng::seed_from_u64(5);
    let input = Tensor::<f64>::randn(&[3, 4], &mut rng);
    let weights = Tensor::<f64>::randn(&[3, 4], &mut rng);
    let diff = Variable::check_gradients(&input, 1e-5, |x| {
      x.softmax() * weights.tracked()
    });
    assert_abs_diff_eq!(diff, 0.0, epsilon = 1e-6);
  }

  #[test]
  fn exp_gradient() {
    let mut rng = StdRng::seed_from_u64(9);
    let input = Tensor::<f64>::randn(&[5], &mut rng);
    let diff = Variable::check_gradients(&input, 1e-5, |x| {
      (x.exp() + 1.0) / (x.exp() * x.exp() + 2.0) * x
    });
    assert_abs_diff_eq!(diff, 0.0, epsilon = 1e-4);
  }
}
