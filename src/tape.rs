//!
//! # tape
//!
//! Arena storage for the nodes of one computation graph, along with the
//! dependency orderer and the backward executor that run over it.
//!
//! Nodes only ever refer to entries allocated before them, so the graph
//! reachable from any node is acyclic by construction.
//!

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

use log::{debug, trace};

use rustc_hash::{FxHashMap, FxHashSet};

use smallvec::SmallVec;

use crate::error::GraphError;
use crate::var::{BinaryOp, Operand, Var};

/// Invariant lifetime brand; two scopes can never agree on the same `'id`, so
/// handles from different graphs cannot be mixed
pub(crate) type Brand<'id> = PhantomData<fn(&'id ()) -> &'id ()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeIndex(usize);

impl NodeIndex {
  #[inline(always)]
  pub(crate) fn get(&self) -> usize {
    self.0
  }
}

/// Local gradient rule of a node, stored as data and interpreted by the
/// backward executor
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Rule {
  Leaf,
  Add(NodeIndex, NodeIndex),
  Mul(NodeIndex, NodeIndex),
  /// Constant exponent, carries no gradient
  Pow(NodeIndex, f64),
  /// Derivative is computed from the node's own cached output
  Tanh(NodeIndex),
}

impl Rule {
  /// Operands deduplicated by identity; `a + a` lists `a` once while the rule
  /// still contributes twice
  fn inputs(&self) -> SmallVec<[NodeIndex; 2]> {
    let mut inputs = SmallVec::new();
    match *self {
      Rule::Leaf => {}
      Rule::Add(a, b) | Rule::Mul(a, b) => {
        inputs.push(a);
        if a != b {
          inputs.push(b);
        }
      }
      Rule::Pow(a, _) | Rule::Tanh(a) => inputs.push(a),
    }
    inputs
  }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
  value: f64,
  grad: f64,
  inputs: SmallVec<[NodeIndex; 2]>,
  rule: Rule,
}

/// A `Tape` is the arena holding every node of a graph; nodes are created
/// through the guard handed out by [`Tape::scope`] and are wiped when that
/// scope ends...
pub struct Tape {
  nodes: RefCell<Vec<Node>>,
}

impl Tape {
  pub fn new() -> Self {
    Self {
      nodes: RefCell::new(Vec::new()),
    }
  }

  /// Preallocate room for `capacity` nodes, useful when the graph size is
  /// roughly known up front
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      nodes: RefCell::new(Vec::with_capacity(capacity)),
    }
  }

  /// Open a scope to build a graph in; every variable created under the guard
  /// is bound to this scope and freed once it returns
  ///
  /// # Example
  ///
  /// ```
  /// use scalargrad::Tape;
  ///
  /// let mut tape = Tape::new();
  /// let grad = tape.scope(|guard| {
  ///   let x = guard.var(3.0);
  ///   let y = &x * &x;
  ///   y.backward();
  ///   x.grad()
  /// });
  /// assert_eq!(grad, 6.0);
  /// ```
  pub fn scope<G, R>(&mut self, f: G) -> R
  where
    G: for<'id> FnOnce(Guard<'id>) -> R,
  {
    let tape: &Tape = self;
    let _frame = ScopeFrame { tape };
    f(Guard {
      tape,
      brand: PhantomData,
    })
  }

  #[inline]
  pub(crate) fn push(&self, value: f64, rule: Rule) -> NodeIndex {
    let mut nodes = self.nodes.borrow_mut();
    let index = NodeIndex(nodes.len());
    trace!("node {} = {:?} -> {}", index.0, rule, value);
    nodes.push(Node {
      value,
      grad: 0.0,
      inputs: rule.inputs(),
      rule,
    });
    index
  }

  #[inline]
  pub(crate) fn value(&self, index: NodeIndex) -> f64 {
    self.nodes.borrow()[index.0].value
  }

  #[inline]
  pub(crate) fn grad(&self, index: NodeIndex) -> f64 {
    self.nodes.borrow()[index.0].grad
  }

  pub(crate) fn inputs(&self, index: NodeIndex) -> SmallVec<[NodeIndex; 2]> {
    self.nodes.borrow()[index.0].inputs.clone()
  }

  pub(crate) fn zero_grad(&self, index: NodeIndex) {
    self.nodes.borrow_mut()[index.0].grad = 0.0;
  }

  fn zero_all(&self) {
    for node in self.nodes.borrow_mut().iter_mut() {
      node.grad = 0.0;
    }
  }

  fn len(&self) -> usize {
    self.nodes.borrow().len()
  }

  /// Post-order over everything reachable from `root` through inputs: each
  /// node comes after all of its operands and appears exactly once
  pub(crate) fn topological_order(&self, root: NodeIndex) -> Vec<NodeIndex> {
    let nodes = self.nodes.borrow();

    let mut stack = vec![(root, false)];
    let mut order = Vec::new();
    let mut visited = FxHashSet::default();

    // linear dfs, deep chains would blow the call stack if this recursed...
    while let Some((index, inputs_done)) = stack.pop() {
      if inputs_done {
        order.push(index);
      } else if visited.insert(index) {
        // marker to emit the node once its inputs are done
        stack.push((index, true));
        // reversed so the first operand is explored first
        for input in nodes[index.0].inputs.iter().rev() {
          if !visited.contains(input) {
            stack.push((*input, false));
          }
        }
      }
    }

    order
  }

  /// Run one reverse pass from `root` and add its gradients onto the
  /// accumulators of every reachable node
  ///
  /// Gradients of the pass are gathered separately and only merged at the end,
  /// so two passes without zeroing leave exactly twice a single pass on every
  /// node...
  pub(crate) fn backward(&self, root: NodeIndex) {
    let order = self.topological_order(root);
    let mut nodes = self.nodes.borrow_mut();

    let mut deltas: FxHashMap<NodeIndex, f64> =
      FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
    // d(root)/d(root)
    deltas.insert(root, 1.0);

    for index in order.iter().rev() {
      // read phase, consumers already ran so the upstream gradient is final
      let upstream = match deltas.get(index) {
        Some(g) => *g,
        None => continue,
      };

      // compute phase
      let node = &nodes[index.0];
      let mut grads: SmallVec<[(NodeIndex, f64); 2]> = SmallVec::new();
      match node.rule {
        Rule::Leaf => {}
        Rule::Add(a, b) => {
          grads.push((a, upstream));
          grads.push((b, upstream));
        }
        Rule::Mul(a, b) => {
          grads.push((a, upstream * nodes[b.0].value));
          grads.push((b, upstream * nodes[a.0].value));
        }
        Rule::Pow(a, k) => {
          grads.push((a, upstream * k * nodes[a.0].value.powf(k - 1.0)));
        }
        Rule::Tanh(a) => {
          let t = node.value;
          grads.push((a, upstream * (1.0 - t * t)));
        }
      }

      // write phase
      for (target, grad) in grads {
        *deltas.entry(target).or_insert(0.0) += grad;
      }
    }

    for (index, delta) in &deltas {
      nodes[index.0].grad += *delta;
    }

    debug!(
      "backward from node {} touched {} nodes",
      root.0,
      deltas.len()
    );
  }
}

impl Default for Tape {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Tape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Tape").field("nodes", &self.len()).finish()
  }
}

/// Empties the arena when a scope ends, even on unwind
struct ScopeFrame<'tape> {
  tape: &'tape Tape,
}

impl Drop for ScopeFrame<'_> {
  fn drop(&mut self) {
    self.tape.nodes.borrow_mut().clear();
  }
}

/// Handle to an open scope; creates leaves and exposes arena-wide operations
#[derive(Clone, Copy)]
pub struct Guard<'id> {
  tape: &'id Tape,
  brand: Brand<'id>,
}

impl<'id> Guard<'id> {
  /// Construct a leaf variable holding `value` with a zero gradient
  #[inline]
  pub fn var(&self, value: f64) -> Var<'id> {
    Var::leaf(self.tape, value)
  }

  /// Build `lhs op rhs` from operands only known at runtime
  ///
  /// Literal left operands take the reflected form, so `apply(Sub, 2.0, x)`
  /// is `2 + (-x)`. The exponent of `Pow` must be a literal.
  pub fn apply(
    &self,
    op: BinaryOp,
    lhs: impl Into<Operand<'id>>,
    rhs: impl Into<Operand<'id>>,
  ) -> Result<Var<'id>, GraphError> {
    let var = match (op, lhs.into(), rhs.into()) {
      (BinaryOp::Pow, _, Operand::Var(_)) => return Err(GraphError::NonConstantExponent),
      (op, Operand::Literal(_), Operand::Literal(_)) => {
        return Err(GraphError::NoVariableOperand { op })
      }
      (BinaryOp::Pow, Operand::Var(a), Operand::Literal(k)) => a.pow(k),
      (BinaryOp::Add, Operand::Var(a), Operand::Var(b)) => a.add(&b),
      (BinaryOp::Add, Operand::Var(a), Operand::Literal(k))
      | (BinaryOp::Add, Operand::Literal(k), Operand::Var(a)) => a.add_f64(k),
      (BinaryOp::Sub, Operand::Var(a), Operand::Var(b)) => a.sub(&b),
      (BinaryOp::Sub, Operand::Var(a), Operand::Literal(k)) => a.sub_f64(k),
      (BinaryOp::Sub, Operand::Literal(k), Operand::Var(b)) => b.rsub_f64(k),
      (BinaryOp::Mul, Operand::Var(a), Operand::Var(b)) => a.mul(&b),
      (BinaryOp::Mul, Operand::Var(a), Operand::Literal(k))
      | (BinaryOp::Mul, Operand::Literal(k), Operand::Var(a)) => a.mul_f64(k),
      (BinaryOp::Div, Operand::Var(a), Operand::Var(b)) => a.div(&b),
      (BinaryOp::Div, Operand::Var(a), Operand::Literal(k)) => a.div_f64(k),
      (BinaryOp::Div, Operand::Literal(k), Operand::Var(b)) => b.rdiv_f64(k),
    };
    Ok(var)
  }

  /// Reset the gradient of every node in this scope to zero
  pub fn zero_grad(&self) {
    self.tape.zero_all();
  }

  /// Number of nodes allocated so far, literals included
  pub fn len(&self) -> usize {
    self.tape.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl fmt::Debug for Guard<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Guard").field("nodes", &self.len()).finish()
  }
}
