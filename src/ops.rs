//! Forward operations. Each one computes its value eagerly and records the
//! operation kind and inputs that the backward driver needs.
//!
//! Only `add`, `mul`, `pow`, `relu` and `tanh` have backward rules of their own;
//! negation, subtraction and division are built out of them.

use crate::{
    error::GradError,
    operand::Operand,
    tape::{ScalarNode, TapeOp},
    Tape,
};

fn check_pow_domain(base: f64, exponent: f64) -> Result<(), GradError> {
    if base == 0. && exponent < 1. {
        Err(GradError::Domain { base, exponent })
    } else {
        Ok(())
    }
}

impl Tape {
    pub fn add<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>, GradError> {
        let (lhs, rhs) = self.coerce_pair(lhs, rhs)?;
        Ok(self.push_op(TapeOp::Add(lhs.idx, rhs.idx), lhs.value() + rhs.value()))
    }

    pub fn mul<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>, GradError> {
        let (lhs, rhs) = self.coerce_pair(lhs, rhs)?;
        Ok(self.push_op(TapeOp::Mul(lhs.idx, rhs.idx), lhs.value() * rhs.value()))
    }

    /// `-term`, recorded as `term * -1`.
    pub fn neg<'a>(&'a self, term: impl Into<Operand<'a>>) -> Result<ScalarNode<'a>, GradError> {
        let term = self.coerce(term)?;
        self.mul(term, -1.)
    }

    /// `lhs - rhs`, recorded as `lhs + (-rhs)`.
    pub fn sub<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>, GradError> {
        let (lhs, rhs) = self.coerce_pair(lhs, rhs)?;
        let neg = self.neg(rhs)?;
        self.add(lhs, neg)
    }

    /// `base` raised to the constant `exponent`.
    ///
    /// Fails with [`GradError::Domain`] for a zero base with an exponent below one,
    /// where the derivative is undefined. Other out-of-domain inputs, such as a
    /// negative base with a fractional exponent, yield NaN like [`f64::powf`].
    pub fn pow<'a>(
        &'a self,
        base: impl Into<Operand<'a>>,
        exponent: f64,
    ) -> Result<ScalarNode<'a>, GradError> {
        let base = base.into();
        self.check(&base)?;
        check_pow_domain(base.value(), exponent)?;
        let base = self.coerce(base)?;
        Ok(self.push_pow(base, exponent))
    }

    /// `lhs / rhs`, recorded as `lhs * rhs^-1`. A zero divisor is a domain error.
    pub fn div<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<ScalarNode<'a>, GradError> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.check(&lhs)?;
        self.check(&rhs)?;
        check_pow_domain(rhs.value(), -1.)?;
        let (lhs, rhs) = self.coerce_pair(lhs, rhs)?;
        let recip = self.push_pow(rhs, -1.);
        self.mul(lhs, recip)
    }

    pub fn relu<'a>(&'a self, term: impl Into<Operand<'a>>) -> Result<ScalarNode<'a>, GradError> {
        let term = self.coerce(term)?;
        Ok(self.push_relu(term))
    }

    /// Computed as `(e^2x - 1) / (e^2x + 1)`, which overflows to NaN for inputs
    /// above about 354.
    pub fn tanh<'a>(&'a self, term: impl Into<Operand<'a>>) -> Result<ScalarNode<'a>, GradError> {
        let term = self.coerce(term)?;
        Ok(self.push_tanh(term))
    }

    fn push_pow<'a>(&'a self, base: ScalarNode<'a>, exponent: f64) -> ScalarNode<'a> {
        let data = base.value().powf(exponent);
        self.push_op(
            TapeOp::Pow {
                term: base.idx,
                exponent,
            },
            data,
        )
    }

    fn push_relu<'a>(&'a self, term: ScalarNode<'a>) -> ScalarNode<'a> {
        let x = term.value();
        self.push_op(TapeOp::Relu(term.idx), if x > 0. { x } else { 0. })
    }

    fn push_tanh<'a>(&'a self, term: ScalarNode<'a>) -> ScalarNode<'a> {
        let e2x = (2. * term.value()).exp();
        self.push_op(TapeOp::Tanh(term.idx), (e2x - 1.) / (e2x + 1.))
    }
}

impl<'a> ScalarNode<'a> {
    /// See [`Tape::pow`].
    pub fn pow(self, exponent: f64) -> Result<Self, GradError> {
        self.tape.pow(self, exponent)
    }

    pub fn relu(self) -> Self {
        self.tape.push_relu(self)
    }

    pub fn tanh(self) -> Self {
        self.tape.push_tanh(self)
    }
}

fn unwrap_op(result: Result<ScalarNode<'_>, GradError>) -> ScalarNode<'_> {
    match result {
        Ok(node) => node,
        Err(err) => panic!("{err}"),
    }
}

// Operators for node with node, node with `f64` and `f64` with node. They cannot
// return a `Result`, so they panic on a `GradError` (nodes of different tapes, or a
// zero divisor); the `Tape` methods of the same name return the error instead.
macro_rules! impl_binary_op {
    ($trait:ident, $method:ident) => {
        impl<'a> std::ops::$trait for ScalarNode<'a> {
            type Output = Self;
            fn $method(self, rhs: Self) -> Self::Output {
                unwrap_op(self.tape.$method(self, rhs))
            }
        }

        impl<'a> std::ops::$trait<f64> for ScalarNode<'a> {
            type Output = Self;
            fn $method(self, rhs: f64) -> Self::Output {
                unwrap_op(self.tape.$method(self, rhs))
            }
        }

        impl<'a> std::ops::$trait<ScalarNode<'a>> for f64 {
            type Output = ScalarNode<'a>;
            fn $method(self, rhs: ScalarNode<'a>) -> Self::Output {
                unwrap_op(rhs.tape.$method(self, rhs))
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);

impl<'a> std::ops::Neg for ScalarNode<'a> {
    type Output = Self;
    fn neg(self) -> Self::Output {
        unwrap_op(self.tape.neg(self))
    }
}
