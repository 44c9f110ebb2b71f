//! Numerical gradients for checking the backward pass.

use crate::{error::GradError, ScalarNode, Tape};

/// Central finite differences `(f(x + eps) - f(x - eps)) / (2 * eps)` of `f`
/// with respect to each coordinate of `point`.
///
/// ```
/// use scalargrad::finite_diff_grad;
///
/// let f = |v: &[f64]| v[0] * v[0] + 3. * v[1];
/// let grads = finite_diff_grad(f, &[2., 1.], 1e-6);
/// assert!((grads[0] - 4.).abs() < 1e-6);
/// assert!((grads[1] - 3.).abs() < 1e-6);
/// ```
pub fn finite_diff_grad(f: impl Fn(&[f64]) -> f64, point: &[f64], eps: f64) -> Vec<f64> {
    let mut perturbed = point.to_vec();
    (0..point.len())
        .map(|i| {
            perturbed[i] = point[i] + eps;
            let f_plus = f(&perturbed);
            perturbed[i] = point[i] - eps;
            let f_minus = f(&perturbed);
            perturbed[i] = point[i];
            (f_plus - f_minus) / (2. * eps)
        })
        .collect()
}

/// Largest absolute difference between two gradient vectors of the same length.
///
/// # Panics
///
/// Panics if `lhs` and `rhs` have different lengths.
pub fn max_grad_error(lhs: &[f64], rhs: &[f64]) -> f64 {
    assert_eq!(lhs.len(), rhs.len(), "gradient lengths differ");
    lhs.iter()
        .zip(rhs)
        .map(|(a, b)| (a - b).abs())
        .fold(0., f64::max)
}

/// Gradients of one expression at one point, from backpropagation and from
/// finite differences.
#[derive(Clone, Debug)]
pub struct GradCheck {
    pub value: f64,
    pub analytic: Vec<f64>,
    pub numeric: Vec<f64>,
}

impl GradCheck {
    pub fn max_error(&self) -> f64 {
        max_grad_error(&self.analytic, &self.numeric)
    }
}

/// Build the expression with `build` on a fresh tape whose leaves hold `point`,
/// backpropagate, and compare against [`finite_diff_grad`].
///
/// Evaluations at perturbed points that fail to build count as NaN, which then
/// shows up in [`GradCheck::max_error`].
pub fn grad_check<F>(build: F, point: &[f64], eps: f64) -> Result<GradCheck, GradError>
where
    F: for<'a> Fn(&'a Tape, &[ScalarNode<'a>]) -> Result<ScalarNode<'a>, GradError>,
{
    let tape = Tape::new();
    let leaves: Vec<_> = point.iter().map(|&v| tape.leaf(v)).collect();
    let out = build(&tape, &leaves)?;
    out.backward();
    let value = out.value();
    let analytic = leaves.iter().map(|leaf| leaf.grad()).collect();

    let numeric = finite_diff_grad(
        |vals| {
            let tape = Tape::new();
            let leaves: Vec<_> = vals.iter().map(|&v| tape.leaf(v)).collect();
            let value = match build(&tape, &leaves) {
                Ok(out) => out.value(),
                Err(_) => f64::NAN,
            };
            value
        },
        point,
        eps,
    );

    Ok(GradCheck {
        value,
        analytic,
        numeric,
    })
}
