//!
//! Errors raised while building a graph through the dynamic operand boundary
//!

use thiserror::Error;

/// Construction errors; nothing is allocated on the tape when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
  /// Power only differentiates with respect to its base, the exponent must be
  /// a plain literal
  #[error("exponent must be a constant literal, got a variable")]
  NonConstantExponent,

  /// An operation on two literals has no variable to differentiate
  #[error("{op:?} needs at least one variable operand, got two literals")]
  NoVariableOperand { op: crate::BinaryOp },
}
