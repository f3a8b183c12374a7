//! Filtered compliance minimization with a mass constraint.
//!
//! This is the problem formulation that drives the assembly and sensitivity routines in a
//! typical optimization loop. The optimizer itself is not part of this crate: it evaluates
//! the functions below and supplies the linear solver.
use crate::assembly::assemble_stiffness_into;
use crate::dofs::DofMap;
use crate::error::{check_len, Error};
use crate::filter::DensityFilter;
use crate::material::{PlaneStressConstitutive, RampPenalty, YoungPoisson};
use crate::mesh::QuadMesh;
use crate::sensitivity::{compute_mass, compute_mass_derivative, compute_stiffness_derivative};
use crate::sparsity::PatternAssembler;
use eyre::WrapErr;
use log::debug;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

/// Solves $K u = f$ for the assembled stiffness matrix.
///
/// Implementations may cache factorizations between calls; the pattern of `matrix` never
/// changes over the lifetime of a [`ComplianceProblem`].
pub trait LinearSolver {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &[f64]) -> eyre::Result<Vec<f64>>;
}

impl<S: LinearSolver + ?Sized> LinearSolver for &mut S {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &[f64]) -> eyre::Result<Vec<f64>> {
        (**self).solve(matrix, rhs)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceParameters {
    pub penalty: RampPenalty,
    pub material: YoungPoisson,
    pub filter_radius: f64,
    /// Fraction of the full-density mass that the design may use.
    #[serde(default = "default_mass_fraction")]
    pub mass_fraction: f64,
    #[serde(default = "default_lower_bound")]
    pub lower_bound: f64,
    #[serde(default = "default_upper_bound")]
    pub upper_bound: f64,
    #[serde(default = "default_initial_design")]
    pub initial_design: f64,
}

fn default_mass_fraction() -> f64 {
    0.4
}

fn default_lower_bound() -> f64 {
    1e-3
}

fn default_upper_bound() -> f64 {
    1.0
}

fn default_initial_design() -> f64 {
    0.95
}

/// The state of the most recent compliance evaluation.
#[derive(Debug, Clone)]
struct Solution {
    design: Vec<f64>,
    displacement: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ComplianceProblem {
    mesh: QuadMesh,
    dofs: DofMap,
    force: Vec<f64>,
    parameters: ComplianceParameters,
    constitutive: PlaneStressConstitutive,
    filter: DensityFilter,
    stiffness: CsrMatrix<f64>,
    total_mass: f64,
    mass_derivative: Vec<f64>,
    solution: Option<Solution>,
}

impl ComplianceProblem {
    pub fn new(mesh: QuadMesh, dofs: DofMap, force: Vec<f64>, parameters: ComplianceParameters) -> eyre::Result<Self> {
        dofs.check_dof_vector("force", &force)?;
        let pattern = PatternAssembler::default().assemble_pattern(&mesh, &dofs)?;
        let values = vec![0.0; pattern.nnz()];
        let stiffness = CsrMatrix::try_from_pattern_and_values(pattern, values)
            .expect("Number of values always matches the pattern");
        let filter = DensityFilter::new(&mesh, parameters.filter_radius)?;
        let total_mass = compute_mass(&mesh, &vec![1.0; mesh.num_nodes()])?;
        let mass_derivative = compute_mass_derivative(&mesh)?;

        debug!(
            "Set up compliance problem with {} design variables and {} DOFs (total mass {total_mass})",
            mesh.num_nodes(),
            dofs.num_dofs()
        );
        Ok(Self {
            constitutive: parameters.material.into(),
            mesh,
            dofs,
            force,
            parameters,
            filter,
            stiffness,
            total_mass,
            mass_derivative,
            solution: None,
        })
    }

    pub fn num_design_variables(&self) -> usize {
        self.mesh.num_nodes()
    }

    /// Mass of the structure at full density everywhere.
    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    /// Mass of the unfiltered design `x`.
    pub fn mass(&self, x: &[f64]) -> eyre::Result<f64> {
        Ok(compute_mass(&self.mesh, x)?)
    }

    /// Gradient of [`mass`](Self::mass), which does not depend on the design.
    pub fn mass_gradient(&self) -> &[f64] {
        &self.mass_derivative
    }

    /// The mass constraint $c(x) = \alpha m_{total} - m(x) \geq 0$.
    pub fn mass_constraint(&self, x: &[f64]) -> eyre::Result<f64> {
        Ok(self.parameters.mass_fraction * self.total_mass - self.mass(x)?)
    }

    pub fn mass_constraint_gradient(&self) -> Vec<f64> {
        self.mass_derivative.iter().map(|d| -d).collect()
    }

    /// Lower and upper bounds for every design variable.
    pub fn variable_bounds(&self) -> (f64, f64) {
        (self.parameters.lower_bound, self.parameters.upper_bound)
    }

    pub fn initial_design(&self) -> Vec<f64> {
        vec![self.parameters.initial_design; self.num_design_variables()]
    }

    /// Computes the compliance $f^T u$ where $K(F x) u = f$.
    ///
    /// The displacement is retained for a subsequent call to
    /// [`compliance_gradient`](Self::compliance_gradient).
    pub fn compliance(&mut self, x: &[f64], mut solver: impl LinearSolver) -> eyre::Result<f64> {
        self.solution = None;
        let rho = self.filter.apply(x)?;
        assemble_stiffness_into(
            &mut self.stiffness,
            &self.mesh,
            &self.dofs,
            &rho,
            &self.parameters.penalty,
            &self.constitutive,
        )?;

        let displacement = solver
            .solve(&self.stiffness, &self.force)
            .wrap_err("failed to solve for the displacement")?;
        check_len("displacement", displacement.len(), self.dofs.num_dofs())?;

        let compliance = self.force.iter().zip(&displacement).map(|(f, u)| f * u).sum::<f64>();
        debug!("Evaluated compliance {compliance:e}");
        self.solution = Some(Solution {
            design: x.to_vec(),
            displacement,
        });
        Ok(compliance)
    }

    /// Computes the gradient of the compliance with respect to the design variables.
    ///
    /// The problem is self-adjoint, so the gradient is $-F^T \frac{\partial}{\partial \rho}(u^T K u)$.
    /// Must be preceded by a call to [`compliance`](Self::compliance) with the same design.
    pub fn compliance_gradient(&self, x: &[f64]) -> eyre::Result<Vec<f64>> {
        let solution = self
            .solution
            .as_ref()
            .ok_or_else(|| Error::precondition("compliance gradient requested before compliance was evaluated"))?;
        if solution.design != x {
            return Err(Error::precondition(
                "compliance gradient requested for a different design than the last compliance evaluation",
            )
            .into());
        }

        let rho = self.filter.apply(x)?;
        let u = &solution.displacement;
        let dkdrho = compute_stiffness_derivative(
            &self.mesh,
            &self.dofs,
            &rho,
            &self.parameters.penalty,
            &self.constitutive,
            u,
            u,
        )?;
        let mut gradient = self.filter.apply_transpose(&dkdrho)?;
        gradient.iter_mut().for_each(|g| *g = -*g);
        Ok(gradient)
    }

    /// The displacement of the most recent compliance evaluation.
    pub fn displacement(&self) -> Option<&[f64]> {
        self.solution.as_ref().map(|s| s.displacement.as_slice())
    }

    /// The stiffness matrix of the most recent compliance evaluation.
    pub fn stiffness(&self) -> &CsrMatrix<f64> {
        &self.stiffness
    }

    pub fn mesh(&self) -> &QuadMesh {
        &self.mesh
    }

    pub fn dofs(&self) -> &DofMap {
        &self.dofs
    }

    pub fn filter(&self) -> &DensityFilter {
        &self.filter
    }
}
