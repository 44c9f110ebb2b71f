use thiserror::Error;

/// Errors raised while building a graph on a [`Tape`](crate::Tape).
///
/// Both kinds abort the operation that raised them; nothing is pushed onto the tape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradError {
    #[error("Domain error: {base} raised to the power {exponent} is not differentiable in the reals")]
    Domain { base: f64, exponent: f64 },

    #[error("Type mismatch: {operand} belongs to a different tape than this operation")]
    TypeMismatch { operand: String },
}
