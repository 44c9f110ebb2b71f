//! Scalar-valued reverse-mode automatic differentiation.
//!
//! Nodes are recorded on a [`Tape`] as they are computed. Calling
//! [`ScalarNode::backward`] on the result accumulates the derivative of that result
//! with respect to every node it was built from.
//!
//! ```
//! use scalargrad::Tape;
//!
//! let tape = Tape::new();
//! let x = tape.labeled("x", 2.);
//! let y = tape.labeled("y", 3.);
//! let z = x * y + x.pow(2.).unwrap() + y.relu();
//! assert_eq!(z.value(), 13.);
//!
//! z.backward();
//! assert_eq!(x.grad(), 7.);
//! assert_eq!(y.grad(), 3.);
//! ```

mod backward;
pub mod error;
mod finite_diff;
mod operand;
mod ops;
pub mod tape;

pub use error::GradError;
pub use finite_diff::{finite_diff_grad, grad_check, max_grad_error, GradCheck};
pub use operand::Operand;
pub use tape::{OpKind, ScalarNode, Tape};

#[cfg(feature = "macro")]
pub use scalargrad_macro::scalargrad;
