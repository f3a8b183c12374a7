//! Relaxed von Mises stress at quadrature points and its derivatives.
//!
//! Stress samples are stored in flat arrays with one entry per quadrature point, the point `q`
//! of element `e` at index `4 * e + q`.
use crate::connectivity::Quad4d2Connectivity;
use crate::dofs::DofMap;
use crate::element::{strain_displacement_matrix, IsoparametricValues};
use crate::error::{check_len, Error, Singularity};
use crate::material::{PlaneStressConstitutive, StressRelaxation};
use crate::mesh::QuadMesh;
use crate::nalgebra::Vector3;
use crate::quadrature::QUADRATURE_POINTS_PER_ELEMENT;

/// The von Mises measure $\sqrt{\sigma_{xx}^2 + \sigma_{yy}^2 - \sigma_{xx} \sigma_{yy} + 3 \tau_{xy}^2}$
/// of a plane stress state.
pub fn von_mises(stress: &Vector3<f64>) -> f64 {
    let (sx, sy, txy) = (stress[0], stress[1], stress[2]);
    (sx * sx + sy * sy - sx * sy + 3.0 * txy * txy).sqrt()
}

/// The gradient of [`von_mises`] with respect to the stress components.
///
/// Returns `None` when the von Mises stress is zero, where the gradient does not exist.
pub fn von_mises_gradient(stress: &Vector3<f64>) -> Option<Vector3<f64>> {
    let vm = von_mises(stress);
    if vm == 0.0 {
        return None;
    }
    let (sx, sy, txy) = (stress[0], stress[1], stress[2]);
    Some(Vector3::new(
        (2.0 * sx - sy) / (2.0 * vm),
        (2.0 * sy - sx) / (2.0 * vm),
        3.0 * txy / vm,
    ))
}

/// The input shared by all stress routines.
#[derive(Debug, Copy, Clone)]
pub struct StressContext<'a> {
    pub mesh: &'a QuadMesh,
    pub dofs: &'a DofMap,
    pub constitutive: &'a PlaneStressConstitutive,
    pub relaxation: &'a StressRelaxation,
}

impl<'a> StressContext<'a> {
    pub fn new(
        mesh: &'a QuadMesh,
        dofs: &'a DofMap,
        constitutive: &'a PlaneStressConstitutive,
        relaxation: &'a StressRelaxation,
    ) -> Self {
        Self {
            mesh,
            dofs,
            constitutive,
            relaxation,
        }
    }

    pub fn num_samples(&self) -> usize {
        QUADRATURE_POINTS_PER_ELEMENT * self.mesh.num_elements()
    }

    fn check_inputs(&self, displacement: &[f64], density: &[f64]) -> Result<(), Error> {
        self.dofs.check_mesh(self.mesh)?;
        self.dofs.check_dof_vector("displacement", displacement)?;
        self.mesh.check_nodal_field("density", density)
    }

    /// Visits each quadrature point with the element index and connectivity, the point index,
    /// the unrelaxed stress, the interpolated density and the isoparametric values.
    #[allow(non_snake_case)]
    fn for_each_sample<F>(&self, displacement: &[f64], density: &[f64], mut visit: F) -> Result<(), Error>
    where
        F: FnMut(usize, &Quad4d2Connectivity, usize, Vector3<f64>, f64, &IsoparametricValues) -> Result<(), Error>,
    {
        let C = self.constitutive.matrix();
        self.mesh.for_each_quadrature_point(|element_index, conn, q, _, v| {
            let B = strain_displacement_matrix(&v.physical_gradients);
            let stress = C * (B * self.dofs.gather(conn, displacement));
            let rho = conn.gather(density).dot(&v.basis);
            visit(element_index, conn, q, stress, rho, v)
        })
    }
}

/// Computes the relaxed von Mises stress $f(\rho_q) \sigma_{vm}$ at every quadrature point.
pub fn evaluate_stress(context: &StressContext, displacement: &[f64], density: &[f64]) -> Result<Vec<f64>, Error> {
    context.check_inputs(displacement, density)?;
    let mut samples = Vec::with_capacity(context.num_samples());
    context.for_each_sample(displacement, density, |_, _, _, stress, rho, _| {
        samples.push(context.relaxation.factor(rho) * von_mises(&stress));
        Ok(())
    })?;
    Ok(samples)
}

/// Given the derivative `dfdstress` of some functional with respect to every stress sample,
/// computes the derivative of the functional with respect to each nodal density.
///
/// Only the relaxation factor depends on the density for a fixed displacement.
pub fn compute_stress_density_derivative(
    context: &StressContext,
    displacement: &[f64],
    density: &[f64],
    dfdstress: &[f64],
) -> Result<Vec<f64>, Error> {
    context.check_inputs(displacement, density)?;
    check_len("dfdstress", dfdstress.len(), context.num_samples())?;

    let mut derivative = vec![0.0; context.mesh.num_nodes()];
    context.for_each_sample(displacement, density, |element_index, conn, q, stress, rho, v| {
        let weight = dfdstress[QUADRATURE_POINTS_PER_ELEMENT * element_index + q];
        let contribution = weight * context.relaxation.derivative(rho) * von_mises(&stress);
        conn.scatter_add(&mut derivative, &(v.basis * contribution));
        Ok(())
    })?;
    Ok(derivative)
}

/// Given the derivative `dfdstress` of some functional with respect to every stress sample,
/// computes the derivative of the functional with respect to each active DOF.
///
/// Samples with zero weight are skipped. A sample with non-zero weight and vanishing stress
/// yields [`Error::NumericallySingular`], since the von Mises stress is not differentiable there.
#[allow(non_snake_case)]
pub fn compute_stress_state_derivative(
    context: &StressContext,
    displacement: &[f64],
    density: &[f64],
    dfdstress: &[f64],
) -> Result<Vec<f64>, Error> {
    context.check_inputs(displacement, density)?;
    check_len("dfdstress", dfdstress.len(), context.num_samples())?;

    let C = context.constitutive.matrix();
    let mut derivative = vec![0.0; context.dofs.num_dofs()];
    context.for_each_sample(displacement, density, |element_index, conn, q, stress, rho, v| {
        let weight = dfdstress[QUADRATURE_POINTS_PER_ELEMENT * element_index + q];
        if weight == 0.0 {
            return Ok(());
        }
        let vanishing = Singularity::VanishingStress {
            element: element_index,
            point: q,
        };
        let gradient = von_mises_gradient(&stress).ok_or(Error::NumericallySingular(vanishing))?;
        let B = strain_displacement_matrix(&v.physical_gradients);
        let dstress = gradient * (weight * context.relaxation.factor(rho));
        let local = B.transpose() * (C.transpose() * dstress);
        context.dofs.scatter_add(conn, &mut derivative, &local);
        Ok(())
    })?;
    Ok(derivative)
}
