//! The fixed 2x2 Gauss rule used for every element integral.
//!
//! All element quantities are integrated with the same rule, and per-point outputs (such as
//! stress samples) are laid out in the order of [`quadrilateral_gauss_2x2`]: the point with
//! index `q` of element `e` lives at position `4 * e + q` in flat arrays.
use crate::nalgebra::Point2;

/// Number of quadrature points per element.
pub const QUADRATURE_POINTS_PER_ELEMENT: usize = 4;

/// Weights and points of a quadrature rule on the reference quadrilateral $[-1, 1]^2$.
pub type QuadraturePair2d = ([f64; QUADRATURE_POINTS_PER_ELEMENT], [Point2<f64>; QUADRATURE_POINTS_PER_ELEMENT]);

/// The 2-point Gauss-Legendre rule on $[-1, 1]$.
pub fn gauss_2() -> ([f64; 2], [f64; 2]) {
    let a = 1.0 / f64::sqrt(3.0);
    ([1.0, 1.0], [-a, a])
}

/// The tensor product of two 2-point Gauss rules.
///
/// Points are ordered with the $\xi$ coordinate varying slowest:
/// $(-a, -a), (-a, a), (a, -a), (a, a)$ with $a = 1/\sqrt{3}$. All weights are 1.
pub fn quadrilateral_gauss_2x2() -> QuadraturePair2d {
    let (weights1d, points1d) = gauss_2();
    let mut weights2d = [0.0; QUADRATURE_POINTS_PER_ELEMENT];
    let mut points2d = [Point2::origin(); QUADRATURE_POINTS_PER_ELEMENT];

    let rule1d_iter = || weights1d.iter().zip(&points1d);

    let mut q = 0;
    for (&wx, &x) in rule1d_iter() {
        for (&wy, &y) in rule1d_iter() {
            weights2d[q] = wx * wy;
            points2d[q] = Point2::new(x, y);
            q += 1;
        }
    }

    (weights2d, points2d)
}
