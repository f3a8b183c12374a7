//! Helpers shared by the tests and benchmarks.
use nalgebra::DVector;

pub use nalgebra;

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Approx assertion for slices, reported through the matrix assertion.
#[macro_export]
macro_rules! assert_approx_slice_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let x: &[f64] = &$x;
        let y: &[f64] = &$y;
        assert_eq!(x.len(), y.len(), "slices have different lengths");
        $crate::assert_approx_matrix_eq!(
            $crate::nalgebra::DVector::from_column_slice(x),
            $crate::nalgebra::DVector::from_column_slice(y),
            abstol = $tol
        );
    }};
}

/// Approximates the gradient of the scalar function `f` at `x` with central differences.
pub fn approximate_gradient(mut f: impl FnMut(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    // x+ := x + h e_j
    // x- := x - h e_j
    let mut x_perturbed = x.to_vec();
    let mut gradient = Vec::with_capacity(x.len());
    for j in 0..x.len() {
        x_perturbed[j] = x[j] + h;
        let f_plus = f(&x_perturbed);
        x_perturbed[j] = x[j] - h;
        let f_minus = f(&x_perturbed);
        x_perturbed[j] = x[j];
        gradient.push((f_plus - f_minus) / (2.0 * h));
    }
    gradient
}

/// Approximates the derivative of the vector function `f` at `x` in the given direction with
/// central differences.
pub fn approximate_directional_derivative(
    mut f: impl FnMut(&[f64]) -> Vec<f64>,
    x: &[f64],
    direction: &[f64],
    h: f64,
) -> Vec<f64> {
    assert_eq!(x.len(), direction.len());
    let x = DVector::from_column_slice(x);
    let d = DVector::from_column_slice(direction);
    let x_plus = &x + &d * h;
    let x_minus = &x - &d * h;
    let f_plus = DVector::from_vec(f(x_plus.as_slice()));
    let f_minus = DVector::from_vec(f(x_minus.as_slice()));
    ((f_plus - f_minus) / (2.0 * h)).as_slice().to_vec()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}
