//! Bilinear quadrilateral element: shape functions and isoparametric geometry.
use crate::error::Error;
use crate::quadrature::{quadrilateral_gauss_2x2, QUADRATURE_POINTS_PER_ELEMENT};
use crate::nalgebra::{Matrix2, Matrix2x4, Point2, SMatrix, SVector, Vector2, Vector4};

/// The $3 \times 8$ plane stress strain-displacement operator.
pub type StrainDisplacementMatrix = SMatrix<f64, 3, 8>;

/// An $8 \times 8$ element matrix, with local DOFs ordered `[x0, y0, x1, y1, ..., x3, y3]`.
pub type ElementMatrix = SMatrix<f64, 8, 8>;

/// A local vector with one entry per element DOF, ordered like [`ElementMatrix`].
pub type ElementVector = SVector<f64, 8>;

/// Quadrature weights paired with the element values at the corresponding points.
pub type ElementQuadrature = (
    [f64; QUADRATURE_POINTS_PER_ELEMENT],
    [IsoparametricValues; QUADRATURE_POINTS_PER_ELEMENT],
);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad4d2Element {
    vertices: [Point2<f64>; 4],
}

/// Returned when the Jacobian determinant of an element is not strictly positive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DegenerateJacobian {
    pub determinant: f64,
}

impl DegenerateJacobian {
    /// Attaches the index of the offending element.
    pub fn in_element(self, element: usize) -> Error {
        Error::GeometryDegenerate {
            element,
            determinant: self.determinant,
        }
    }
}

/// Shape function values and physical derivatives at a single reference point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IsoparametricValues {
    /// The four shape function values $N_I$.
    pub basis: Vector4<f64>,
    /// Column $I$ holds $\nabla_x N_I$, i.e. $J^{-T} \nabla_\xi N_I$.
    pub physical_gradients: Matrix2x4<f64>,
    /// $\det J$, strictly positive.
    pub jacobian_det: f64,
    /// The physical coordinates of the reference point.
    pub position: Point2<f64>,
}

impl Quad4d2Element {
    pub fn from_vertices(vertices: [Point2<f64>; 4]) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point2<f64>; 4] {
        &self.vertices
    }

    pub fn reference() -> Self {
        Self::from_vertices([
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(-1.0, 1.0),
        ])
    }

    #[rustfmt::skip]
    pub fn evaluate_basis(&self, xi: &Point2<f64>) -> Vector4<f64> {
        // N_{alpha, beta}([alpha, beta]) = 1 with alpha, beta = 1 or -1
        let phi = |alpha: f64, beta: f64| (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) / 4.0;
        Vector4::new(
            phi(-1.0, -1.0),
            phi( 1.0, -1.0),
            phi( 1.0,  1.0),
            phi(-1.0,  1.0),
        )
    }

    /// Derivatives of the shape functions with respect to the reference coordinates.
    #[rustfmt::skip]
    pub fn gradients(&self, xi: &Point2<f64>) -> Matrix2x4<f64> {
        let phi_grad = |alpha: f64, beta: f64|
            Vector2::new(
                alpha * (1.0 + beta * xi[1]) / 4.0,
                beta * (1.0 + alpha * xi[0]) / 4.0,
            );

        Matrix2x4::from_columns(&[
            phi_grad(-1.0, -1.0),
            phi_grad( 1.0, -1.0),
            phi_grad( 1.0,  1.0),
            phi_grad(-1.0,  1.0),
        ])
    }

    fn vertex_matrix(&self) -> Matrix2x4<f64> {
        Matrix2x4::from_fn(|i, j| self.vertices[j][i])
    }

    #[allow(non_snake_case)]
    pub fn map_reference_coords(&self, xi: &Point2<f64>) -> Point2<f64> {
        let X = self.vertex_matrix();
        let N = self.evaluate_basis(xi);
        Point2::from(X * N)
    }

    /// The Jacobian $J = \partial x / \partial \xi$ of the isoparametric map.
    #[allow(non_snake_case)]
    pub fn reference_jacobian(&self, xi: &Point2<f64>) -> Matrix2<f64> {
        let X = self.vertex_matrix();
        let G = self.gradients(xi);
        X * G.transpose()
    }

    /// Evaluates shape functions, the Jacobian determinant and physical gradients at `xi`.
    ///
    /// Fails if $\det J \leq 0$ or is not finite, since the physical gradients are then
    /// meaningless.
    #[allow(non_snake_case)]
    pub fn evaluate_at(&self, xi: &Point2<f64>) -> Result<IsoparametricValues, DegenerateJacobian> {
        let X = self.vertex_matrix();
        let N = self.evaluate_basis(xi);
        let G = self.gradients(xi);
        let J = self.reference_jacobian(xi);
        let determinant = J.determinant();
        if !(determinant > 0.0) || !determinant.is_finite() {
            return Err(DegenerateJacobian { determinant });
        }
        let J_inv = J
            .try_inverse()
            .ok_or(DegenerateJacobian { determinant })?;

        Ok(IsoparametricValues {
            basis: N,
            physical_gradients: J_inv.transpose() * G,
            jacobian_det: determinant,
            position: Point2::from(X * N),
        })
    }

    /// Evaluates the element at every point of the 2x2 Gauss rule, in quadrature point order.
    ///
    /// Returns the quadrature weights alongside the values.
    pub fn evaluate_quadrature(
        &self,
    ) -> Result<ElementQuadrature, DegenerateJacobian> {
        let (weights, points) = quadrilateral_gauss_2x2();
        let values = [
            self.evaluate_at(&points[0])?,
            self.evaluate_at(&points[1])?,
            self.evaluate_at(&points[2])?,
            self.evaluate_at(&points[3])?,
        ];
        Ok((weights, values))
    }
}

/// Builds the operator $B$ mapping local displacements to the plane stress strain
/// $(\varepsilon_{xx}, \varepsilon_{yy}, \gamma_{xy})$.
pub fn strain_displacement_matrix(physical_gradients: &Matrix2x4<f64>) -> StrainDisplacementMatrix {
    let mut b = StrainDisplacementMatrix::zeros();
    for (i, grad) in physical_gradients.column_iter().enumerate() {
        let (dx, dy) = (grad[0], grad[1]);
        b[(0, 2 * i)] = dx;
        b[(1, 2 * i + 1)] = dy;
        b[(2, 2 * i)] = dy;
        b[(2, 2 * i + 1)] = dx;
    }
    b
}
