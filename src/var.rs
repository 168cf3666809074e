//!
//! # var
//!
//! Handles to nodes on a tape and the builders for every supported operation.
//! Only `add`, `mul`, `pow` and `tanh` own a gradient rule; everything else is
//! composed from them, so its derivative follows from the chain rule alone.
//!

use std::fmt;
use std::marker::PhantomData;

use crate::tape::{Brand, NodeIndex, Rule, Tape};

/// A variable in the computational graph.
///
/// Variables are created via [`Guard::var`](crate::Guard::var) or as the
/// result of an operation on other variables; they are cheap to copy and all
/// copies refer to the same node.
#[derive(Clone, Copy)]
pub struct Var<'id> {
  value: f64,
  index: NodeIndex,
  tape: &'id Tape,
  brand: Brand<'id>,
}

impl<'id> Var<'id> {
  #[inline]
  pub(crate) fn leaf(tape: &'id Tape, value: f64) -> Self {
    Self::derived(tape, value, Rule::Leaf)
  }

  #[inline]
  fn derived(tape: &'id Tape, value: f64, rule: Rule) -> Self {
    Var {
      value,
      index: tape.push(value, rule),
      tape,
      brand: PhantomData,
    }
  }

  fn at(tape: &'id Tape, index: NodeIndex) -> Self {
    Var {
      value: tape.value(index),
      index,
      tape,
      brand: PhantomData,
    }
  }

  /// A constant on the same tape, used to lift literal operands
  #[inline]
  fn literal(&self, value: f64) -> Self {
    Self::leaf(self.tape, value)
  }

  /// Forward value, fixed at construction
  #[inline(always)]
  pub fn value(&self) -> f64 {
    self.value
  }

  /// Accumulated gradient; zero until a backward pass reaches this node
  #[inline]
  pub fn grad(&self) -> f64 {
    self.tape.grad(self.index)
  }

  /// Differentiate this variable with respect to everything it was built from
  ///
  /// Gradients are added onto what the nodes already hold, call
  /// [`Guard::zero_grad`](crate::Guard::zero_grad) between independent passes.
  pub fn backward(&self) {
    self.tape.backward(self.index);
  }

  pub fn zero_grad(&self) {
    self.tape.zero_grad(self.index);
  }

  /// The distinct operands this variable was computed from
  pub fn inputs(&self) -> Vec<Var<'id>> {
    self
      .tape
      .inputs(self.index)
      .into_iter()
      .map(|index| Var::at(self.tape, index))
      .collect()
  }

  /// Every variable reachable from this one, operands before the variables
  /// consuming them, ending with `self`
  pub fn topological_order(&self) -> Vec<Var<'id>> {
    self
      .tape
      .topological_order(self.index)
      .into_iter()
      .map(|index| Var::at(self.tape, index))
      .collect()
  }

  /// True when both handles refer to the same node
  #[inline]
  pub fn same_node(&self, other: &Var<'id>) -> bool {
    self.index == other.index
  }

  #[inline]
  pub fn add(&self, other: &Var<'id>) -> Self {
    Self::derived(
      self.tape,
      self.value + other.value,
      Rule::Add(self.index, other.index),
    )
  }

  #[inline]
  pub fn mul(&self, other: &Var<'id>) -> Self {
    Self::derived(
      self.tape,
      self.value * other.value,
      Rule::Mul(self.index, other.index),
    )
  }

  /// Raise to a constant power; the exponent is not differentiated
  #[inline]
  pub fn pow(&self, exp: f64) -> Self {
    Self::derived(self.tape, self.value.powf(exp), Rule::Pow(self.index, exp))
  }

  #[inline]
  pub fn tanh(&self) -> Self {
    Self::derived(self.tape, self.value.tanh(), Rule::Tanh(self.index))
  }

  #[inline]
  pub fn neg(&self) -> Self {
    self.mul_f64(-1.0)
  }

  #[inline]
  pub fn sub(&self, other: &Var<'id>) -> Self {
    self.add(&other.neg())
  }

  #[inline]
  pub fn div(&self, other: &Var<'id>) -> Self {
    self.mul(&other.pow(-1.0))
  }

  #[inline]
  pub fn add_f64(&self, other: f64) -> Self {
    self.add(&self.literal(other))
  }

  #[inline]
  pub fn sub_f64(&self, other: f64) -> Self {
    self.sub(&self.literal(other))
  }

  #[inline]
  pub fn mul_f64(&self, other: f64) -> Self {
    self.mul(&self.literal(other))
  }

  #[inline]
  pub fn div_f64(&self, other: f64) -> Self {
    self.div(&self.literal(other))
  }

  /// `other - self`, built as `other + (-self)`
  #[inline]
  pub fn rsub_f64(&self, other: f64) -> Self {
    self.literal(other).add(&self.neg())
  }

  /// `other / self`, built as `other * self^-1`
  #[inline]
  pub fn rdiv_f64(&self, other: f64) -> Self {
    self.literal(other).mul(&self.pow(-1.0))
  }
}

impl fmt::Display for Var<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Var(value={})", self.value)
  }
}

impl fmt::Debug for Var<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Var")
      .field("value", &self.value)
      .field("grad", &self.grad())
      .field("index", &self.index.get())
      .finish()
  }
}

/// Binary operations reachable through [`Guard::apply`](crate::Guard::apply)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  /// Right operand must be a literal
  Pow,
}

/// An operand whose kind is only known at runtime
#[derive(Debug, Clone, Copy)]
pub enum Operand<'id> {
  Literal(f64),
  Var(Var<'id>),
}

impl From<f64> for Operand<'_> {
  fn from(value: f64) -> Self {
    Operand::Literal(value)
  }
}

impl<'id> From<Var<'id>> for Operand<'id> {
  fn from(var: Var<'id>) -> Self {
    Operand::Var(var)
  }
}

impl<'id> From<&Var<'id>> for Operand<'id> {
  fn from(var: &Var<'id>) -> Self {
    Operand::Var(*var)
  }
}

#[cfg(test)]
mod tests {
  use crate::{BinaryOp, GraphError, Tape};

  mod var {
    use super::*;

    #[test]
    fn value() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(1.3);
        assert_eq!(a.value(), 1.3);
        assert_eq!(a.grad(), 0.0);
        assert!(a.inputs().is_empty());
      });
    }

    #[test]
    fn display() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(2.5);
        assert_eq!(a.to_string(), "Var(value=2.5)");
      });
    }

    #[test]
    fn add() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(3.0);
        let b = guard.var(4.0);
        let c = a.add(&b);
        assert_eq!(c.value(), 7.0);
        c.backward();
        // df/da = 1, df/db = 1
        assert_eq!(a.grad(), 1.0);
        assert_eq!(b.grad(), 1.0);
      });
    }

    #[test]
    fn mul() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(3.0);
        let b = guard.var(4.0);
        let c = a.mul(&b);
        assert_eq!(c.value(), 12.0);
        c.backward();
        // df/da = b, df/db = a
        assert_eq!(a.grad(), 4.0);
        assert_eq!(b.grad(), 3.0);
      });
    }

    #[test]
    fn pow() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(2.0);
        let c = a.pow(3.0);
        assert_eq!(c.value(), 8.0);
        c.backward();
        // df/da = 3 * a^2
        assert_eq!(a.grad(), 12.0);
      });
    }

    #[test]
    fn tanh() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(0.8);
        let b = a.tanh();
        assert_eq!(b.value(), 0.8f64.tanh());
        b.backward();
        // df/da = 1 - tanh^2(a)
        assert_eq!(a.grad(), 1.0 - 0.8f64.tanh() * 0.8f64.tanh());
      });
    }

    #[test]
    fn neg() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(2.0);
        let b = a.neg();
        assert_eq!(b.value(), -2.0);
        b.backward();
        assert_eq!(a.grad(), -1.0);
      });
    }

    #[test]
    fn sub() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(7.0);
        let b = guard.var(4.0);
        let c = a.sub(&b);
        assert_eq!(c.value(), 3.0);
        c.backward();
        assert_eq!(a.grad(), 1.0);
        assert_eq!(b.grad(), -1.0);
      });
    }

    #[test]
    fn div() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(6.0);
        let b = guard.var(2.0);
        let c = a.div(&b);
        assert_eq!(c.value(), 3.0);
        c.backward();
        // df/da = 1/b, df/db = -a/b^2
        assert_eq!(a.grad(), 0.5);
        assert_eq!(b.grad(), -1.5);
      });
    }

    #[test]
    fn rsub_f64() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(2.0);
        let c = a.rsub_f64(10.0);
        assert_eq!(c.value(), 8.0);
        c.backward();
        assert_eq!(a.grad(), -1.0);
      });
    }

    #[test]
    fn rdiv_f64() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(4.0);
        let c = a.rdiv_f64(2.0);
        assert_eq!(c.value(), 0.5);
        c.backward();
        // d/da 2/a = -2/a^2
        assert_eq!(a.grad(), -0.125);
      });
    }

    #[test]
    fn inputs_are_deduplicated() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(3.0);
        let b = guard.var(1.0);
        let square = a.mul(&a);
        let inputs = square.inputs();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].same_node(&a));
        assert_eq!(a.add(&b).inputs().len(), 2);
      });
    }

    #[test]
    fn operands_untouched_by_construction() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let a = guard.var(3.0);
        let before = guard.len();
        let _ = a.pow(2.0);
        assert_eq!(guard.len(), before + 1);
        assert_eq!(a.value(), 3.0);
        assert_eq!(a.grad(), 0.0);
      });
    }
  }

  mod apply {
    use super::*;

    #[test]
    fn mixed_operands() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let x = guard.var(4.0);
        let sum = guard.apply(BinaryOp::Add, 1.0, x).unwrap();
        let diff = guard.apply(BinaryOp::Sub, 1.0, x).unwrap();
        let quot = guard.apply(BinaryOp::Div, 1.0, &x).unwrap();
        let cube = guard.apply(BinaryOp::Pow, x, 3.0).unwrap();
        assert_eq!(sum.value(), 5.0);
        assert_eq!(diff.value(), -3.0);
        assert_eq!(quot.value(), 0.25);
        assert_eq!(cube.value(), 64.0);
      });
    }

    #[test]
    fn variable_exponent_rejected() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let x = guard.var(2.0);
        let y = guard.var(3.0);
        let before = guard.len();
        let err = guard.apply(BinaryOp::Pow, x, y).unwrap_err();
        assert_eq!(err, GraphError::NonConstantExponent);
        assert_eq!(guard.len(), before);
      });
    }

    #[test]
    fn two_literals_rejected() {
      let mut tape = Tape::new();
      tape.scope(|guard| {
        let err = guard.apply(BinaryOp::Mul, 2.0, 3.0).unwrap_err();
        assert_eq!(err, GraphError::NoVariableOperand { op: BinaryOp::Mul });
        assert!(guard.is_empty());
      });
    }
  }
}
