//! Scalar structural quantities and derivatives of bilinear forms with respect to the nodal
//! density field.
//!
//! Every density derivative is returned per node. Since the density at a quadrature point is
//! interpolated from the nodal values, a contribution $g_q$ computed at quadrature point $q$
//! is distributed as $N_k(\xi_q) g_q$ to node $k$ of the element.
use crate::connectivity::Quad4d2Connectivity;
use crate::dofs::DofMap;
use crate::element::{strain_displacement_matrix, ElementVector};
use crate::error::Error;
use crate::material::{PlaneStressConstitutive, RampPenalty};
use crate::mesh::QuadMesh;
use crate::nalgebra::{Vector2, Vector4};
use log::debug;

/// The integral of the density over the domain.
pub fn compute_mass(mesh: &QuadMesh, density: &[f64]) -> Result<f64, Error> {
    mesh.check_nodal_field("density", density)?;
    let mut mass = 0.0;
    mesh.for_each_quadrature_point(|_, conn, _, w_det, v| {
        mass += w_det * conn.gather(density).dot(&v.basis);
        Ok(())
    })?;
    Ok(mass)
}

/// The derivative of [`compute_mass`] with respect to each nodal density.
///
/// Mass is linear in the density, so the result does not depend on it, and
/// `compute_mass(mesh, rho)` equals the dot product of `rho` with the returned vector.
pub fn compute_mass_derivative(mesh: &QuadMesh) -> Result<Vec<f64>, Error> {
    let mut dmass = vec![0.0; mesh.num_nodes()];
    mesh.for_each_quadrature_point(|_, conn, _, w_det, v| {
        conn.scatter_add(&mut dmass, &(v.basis * w_det));
        Ok(())
    })?;
    Ok(dmass)
}

/// Zeroth, first and second moments of the density about the origin.
struct Moments {
    mass: f64,
    first: Vector2<f64>,
    second: f64,
}

impl Moments {
    fn center_of_mass(&self) -> Result<Vector2<f64>, Error> {
        if self.mass == 0.0 {
            Err(Error::precondition(
                "moment of inertia about the center of mass is undefined for zero total mass",
            ))
        } else {
            Ok(self.first / self.mass)
        }
    }
}

fn compute_moments(mesh: &QuadMesh, density: &[f64]) -> Result<Moments, Error> {
    let mut moments = Moments {
        mass: 0.0,
        first: Vector2::zeros(),
        second: 0.0,
    };
    mesh.for_each_quadrature_point(|_, conn, _, w_det, v| {
        let dm = w_det * conn.gather(density).dot(&v.basis);
        let x = v.position.coords;
        moments.mass += dm;
        moments.first += x * dm;
        moments.second += x.norm_squared() * dm;
        Ok(())
    })?;
    Ok(moments)
}

/// The polar moment of inertia of the density about its center of mass,
/// $$
/// I_c = I_0 - m \\, |c|^2, \quad c = \frac{1}{m} \int \rho x \\, dA,
/// $$
/// where $I_0$ is the polar moment about the origin.
///
/// Fails with a precondition violation if the total mass is zero.
pub fn compute_moment_of_inertia(mesh: &QuadMesh, density: &[f64]) -> Result<f64, Error> {
    mesh.check_nodal_field("density", density)?;
    let moments = compute_moments(mesh, density)?;
    let c = moments.center_of_mass()?;
    Ok(moments.second - moments.mass * c.norm_squared())
}

/// The derivative of [`compute_moment_of_inertia`] with respect to each nodal density.
///
/// The center of mass moves with the density, so the derivative combines the derivatives of
/// all three moments:
/// $$
/// \frac{\partial I_c}{\partial \rho_k} = \frac{\partial I_0}{\partial \rho_k}
///     + |c|^2 \frac{\partial m}{\partial \rho_k} - 2 c \cdot \frac{\partial M}{\partial \rho_k},
/// $$
/// with $M$ the first moment.
pub fn compute_moment_of_inertia_derivative(mesh: &QuadMesh, density: &[f64]) -> Result<Vec<f64>, Error> {
    mesh.check_nodal_field("density", density)?;
    let c = compute_moments(mesh, density)?.center_of_mass()?;
    let c_norm_squared = c.norm_squared();

    let mut derivative = vec![0.0; mesh.num_nodes()];
    mesh.for_each_quadrature_point(|_, conn, _, w_det, v| {
        let x = v.position.coords;
        let per_unit_density = w_det * (x.norm_squared() + c_norm_squared - 2.0 * c.dot(&x));
        conn.scatter_add(&mut derivative, &(v.basis * per_unit_density));
        Ok(())
    })?;
    Ok(derivative)
}

/// Computes the derivative of $\psi^T K(\rho) \phi$ with respect to each nodal density.
#[allow(clippy::too_many_arguments)]
pub fn compute_stiffness_derivative(
    mesh: &QuadMesh,
    dofs: &DofMap,
    density: &[f64],
    penalty: &RampPenalty,
    constitutive: &PlaneStressConstitutive,
    psi: &[f64],
    phi: &[f64],
) -> Result<Vec<f64>, Error> {
    check_bilinear_inputs(mesh, dofs, psi, phi)?;
    mesh.check_nodal_field("density", density)?;

    let mut derivative = vec![0.0; mesh.num_nodes()];
    let penalty_derivative = |conn: &Quad4d2Connectivity, basis: &Vector4<f64>| {
        let rho = conn.gather(density).dot(basis);
        penalty.derivative(rho)
    };
    accumulate_stiffness_contraction(mesh, dofs, constitutive, psi, phi, penalty_derivative, &mut derivative)?;
    debug!("Computed stiffness derivative for {} elements", mesh.num_elements());
    Ok(derivative)
}

/// Computes the product of the Hessian of $\psi^T K(\rho) \phi$ with the nodal density
/// perturbation `direction`, for each nodal density.
#[allow(clippy::too_many_arguments)]
pub fn compute_stiffness_second_derivative(
    mesh: &QuadMesh,
    dofs: &DofMap,
    density: &[f64],
    penalty: &RampPenalty,
    constitutive: &PlaneStressConstitutive,
    direction: &[f64],
    psi: &[f64],
    phi: &[f64],
) -> Result<Vec<f64>, Error> {
    check_bilinear_inputs(mesh, dofs, psi, phi)?;
    mesh.check_nodal_field("density", density)?;
    mesh.check_nodal_field("direction", direction)?;

    let mut hessian_product = vec![0.0; mesh.num_nodes()];
    let weighted_second_derivative = |conn: &Quad4d2Connectivity, basis: &Vector4<f64>| {
        let rho = conn.gather(density).dot(basis);
        let sval = conn.gather(direction).dot(basis);
        penalty.second_derivative(rho) * sval
    };
    accumulate_stiffness_contraction(
        mesh,
        dofs,
        constitutive,
        psi,
        phi,
        weighted_second_derivative,
        &mut hessian_product,
    )?;
    Ok(hessian_product)
}

/// Computes the derivative of $\psi^T M(\rho) \phi$ with respect to each nodal density.
///
/// The mass matrix is linear in the density, so the result depends only on the geometry,
/// the material density and the two vectors.
pub fn compute_mass_matrix_derivative(
    mesh: &QuadMesh,
    dofs: &DofMap,
    material_density: f64,
    psi: &[f64],
    phi: &[f64],
) -> Result<Vec<f64>, Error> {
    check_bilinear_inputs(mesh, dofs, psi, phi)?;

    let mut derivative = vec![0.0; mesh.num_nodes()];
    mesh.for_each_quadrature_point(|_, conn, _, w_det, v| {
        let u_psi = interpolate_displacement(&dofs.gather(conn, psi), &v.basis);
        let u_phi = interpolate_displacement(&dofs.gather(conn, phi), &v.basis);
        let contribution = w_det * material_density * u_psi.dot(&u_phi);
        conn.scatter_add(&mut derivative, &(v.basis * contribution));
        Ok(())
    })?;
    Ok(derivative)
}

fn interpolate_displacement(local: &ElementVector, basis: &Vector4<f64>) -> Vector2<f64> {
    let mut u = Vector2::zeros();
    for (a, n) in basis.iter().enumerate() {
        u += Vector2::new(local[2 * a], local[2 * a + 1]) * *n;
    }
    u
}

/// Accumulates $\sum_q w_q \det J_q \\, s_q \\, (B \psi_e)^T C (B \phi_e) N_k(\xi_q)$ into
/// `output`, where `s_q` is computed by `scale` from the connectivity and shape functions.
#[allow(non_snake_case)]
fn accumulate_stiffness_contraction(
    mesh: &QuadMesh,
    dofs: &DofMap,
    constitutive: &PlaneStressConstitutive,
    psi: &[f64],
    phi: &[f64],
    scale: impl Fn(&Quad4d2Connectivity, &Vector4<f64>) -> f64,
    output: &mut [f64],
) -> Result<(), Error> {
    let C = constitutive.matrix();
    mesh.for_each_quadrature_point(|_, conn, _, w_det, v| {
        let B = strain_displacement_matrix(&v.physical_gradients);
        let strain_psi = B * dofs.gather(conn, psi);
        let stress_phi = C * B * dofs.gather(conn, phi);
        let contribution = w_det * scale(conn, &v.basis) * strain_psi.dot(&stress_phi);
        conn.scatter_add(output, &(v.basis * contribution));
        Ok(())
    })
}

fn check_bilinear_inputs(mesh: &QuadMesh, dofs: &DofMap, psi: &[f64], phi: &[f64]) -> Result<(), Error> {
    dofs.check_mesh(mesh)?;
    dofs.check_dof_vector("psi", psi)?;
    dofs.check_dof_vector("phi", phi)
}
