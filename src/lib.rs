//!
//! # scalargrad
//!
//! Reverse-mode automatic differentiation over `f64` scalars.
//!
//! Every variable lives on a [`Tape`], an arena holding the nodes of one
//! expression graph. A graph is built inside [`Tape::scope`] from leaves made
//! by [`Guard::var`] and ordinary operators; calling [`Var::backward`] on any
//! node then fills in the gradient of that node with respect to everything it
//! was built from.
//!
//! ```
//! use scalargrad::Tape;
//!
//! let mut tape = Tape::new();
//! tape.scope(|guard| {
//!   let a = guard.var(2.0);
//!   let b = guard.var(-3.0);
//!   let c = guard.var(10.0);
//!   let y = (&a * &b + &c).tanh();
//!   y.backward();
//!   let t = y.value();
//!   assert_eq!(a.grad(), (1.0 - t * t) * b.value());
//! });
//! ```
//!
//! ## Scoping
//!
//! The closure passed to [`Tape::scope`] receives a guard branded with a fresh
//! lifetime, so variables can neither escape their scope nor be combined with
//! variables of another scope. The arena is emptied when the scope returns.
//!
//! ## Accumulation
//!
//! Gradients accumulate across backward passes; zero them with
//! [`Guard::zero_grad`] between unrelated passes.
//!

mod error;
mod ops;
mod tape;
mod var;

pub use error::GraphError;
pub use tape::{Guard, Tape};
pub use var::{BinaryOp, Operand, Var};
