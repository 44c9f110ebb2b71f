//! Backpropagated gradients against central finite differences at random points.

use rand::Rng;
use scalargrad::{grad_check, GradError, ScalarNode, Tape};

const EPS: f64 = 1e-5;
const TOL: f64 = 1e-5;

fn check_at_random_points<F>(name: &str, build: F, arity: usize, range: std::ops::Range<f64>)
where
    F: for<'a> Fn(&'a Tape, &[ScalarNode<'a>]) -> Result<ScalarNode<'a>, GradError>,
{
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let point: Vec<f64> = (0..arity).map(|_| rng.gen_range(range.clone())).collect();
        let check = grad_check(&build, &point, EPS).unwrap();
        assert!(
            check.max_error() < TOL,
            "{name} at {point:?}: autodiff={:?}, fd={:?}",
            check.analytic,
            check.numeric
        );
    }
}

#[test]
fn add() {
    check_at_random_points("add", |tape, x| tape.add(x[0], x[1]), 2, -3.0..3.0);
}

#[test]
fn mul() {
    check_at_random_points("mul", |tape, x| tape.mul(x[0], x[1]), 2, -3.0..3.0);
}

#[test]
fn neg() {
    check_at_random_points("neg", |tape, x| tape.neg(x[0]), 1, -3.0..3.0);
}

#[test]
fn sub() {
    check_at_random_points("sub", |tape, x| tape.sub(x[0], x[1]), 2, -3.0..3.0);
}

#[test]
fn pow() {
    check_at_random_points("pow", |tape, x| tape.pow(x[0], 3.5), 1, 0.5..3.0);
    check_at_random_points("pow", |tape, x| tape.pow(x[0], -2.), 1, 0.5..3.0);
}

#[test]
fn div() {
    check_at_random_points("div", |tape, x| tape.div(x[0], x[1]), 2, 0.5..3.0);
}

#[test]
fn relu() {
    check_at_random_points("relu", |tape, x| tape.relu(x[0]), 1, 0.1..3.0);
    check_at_random_points("relu", |tape, x| tape.relu(x[0]), 1, -3.0..-0.1);
}

#[test]
fn tanh() {
    check_at_random_points("tanh", |tape, x| tape.tanh(x[0]), 1, -3.0..3.0);
}

#[test]
fn composite() {
    // (x*y + x^2 + relu(y)) / (1 + tanh(x - y)^2)
    check_at_random_points(
        "composite",
        |tape, v| {
            let (x, y) = (v[0], v[1]);
            let num = x * y + x.pow(2.)? + y.relu();
            let den = 1. + (x - y).tanh().pow(2.)?;
            tape.div(num, den)
        },
        2,
        0.1..2.0,
    );
}

#[test]
fn forward_matches_plain_arithmetic() {
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let (a, b): (f64, f64) = (rng.gen_range(0.5..3.0), rng.gen_range(-3.0..3.0));
        let tape = Tape::new();
        let (x, y) = (tape.leaf(a), tape.leaf(b));
        let z = (x * y + x.pow(1.5).unwrap()) / x + y.tanh() - (x - y).relu();
        let expected = (a * b + a.powf(1.5)) / a + b.tanh() - (a - b).max(0.);
        approx::assert_abs_diff_eq!(z.value(), expected, epsilon = 1e-12);
    }
}
