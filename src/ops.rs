//!
//! # ops
//!
//! `std::ops` sugar over the builders on [`Var`]. Every form a binary operator
//! can take (owned, borrowed, literal on either side) lowers to the same
//! builder, so `2.0 * &x` and `&x * 2.0` produce the same graph.
//!
//! `^` raises to a constant power; mind that it binds looser than `+` and `*`.
//!

use std::ops::{Add, BitXor, Div, Mul, Neg, Sub};

use crate::var::Var;

macro_rules! binary_op {
  ($trait:ident, $method:ident, $var:ident, $lit:ident, $reflected:ident) => {
    impl<'id> $trait<&Var<'id>> for &Var<'id> {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: &Var<'id>) -> Self::Output {
        Var::$var(self, rhs)
      }
    }

    impl<'id> $trait<Var<'id>> for &Var<'id> {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: Var<'id>) -> Self::Output {
        Var::$var(self, &rhs)
      }
    }

    impl<'id> $trait<&Var<'id>> for Var<'id> {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: &Var<'id>) -> Self::Output {
        Var::$var(&self, rhs)
      }
    }

    impl<'id> $trait for Var<'id> {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: Var<'id>) -> Self::Output {
        Var::$var(&self, &rhs)
      }
    }

    impl<'id> $trait<f64> for &Var<'id> {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: f64) -> Self::Output {
        Var::$lit(self, rhs)
      }
    }

    impl<'id> $trait<f64> for Var<'id> {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: f64) -> Self::Output {
        Var::$lit(&self, rhs)
      }
    }

    impl<'id> $trait<&Var<'id>> for f64 {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: &Var<'id>) -> Self::Output {
        Var::$reflected(rhs, self)
      }
    }

    impl<'id> $trait<Var<'id>> for f64 {
      type Output = Var<'id>;

      #[inline(always)]
      fn $method(self, rhs: Var<'id>) -> Self::Output {
        Var::$reflected(&rhs, self)
      }
    }
  };
}

// add and mul commute, so their reflected forms are the direct ones
binary_op!(Add, add, add, add_f64, add_f64);
binary_op!(Sub, sub, sub, sub_f64, rsub_f64);
binary_op!(Mul, mul, mul, mul_f64, mul_f64);
binary_op!(Div, div, div, div_f64, rdiv_f64);

impl<'id> Neg for &Var<'id> {
  type Output = Var<'id>;

  #[inline(always)]
  fn neg(self) -> Self::Output {
    Var::neg(self)
  }
}

impl<'id> Neg for Var<'id> {
  type Output = Var<'id>;

  #[inline(always)]
  fn neg(self) -> Self::Output {
    Var::neg(&self)
  }
}

// only literal exponents, a variable on the right does not typecheck
impl<'id> BitXor<f64> for &Var<'id> {
  type Output = Var<'id>;

  #[inline(always)]
  fn bitxor(self, exp: f64) -> Self::Output {
    Var::pow(self, exp)
  }
}

impl<'id> BitXor<f64> for Var<'id> {
  type Output = Var<'id>;

  #[inline(always)]
  fn bitxor(self, exp: f64) -> Self::Output {
    Var::pow(&self, exp)
  }
}
