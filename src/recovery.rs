//! Superconvergent patch recovery (SPR) of nodal stress from quadrature point samples.
//!
//! For every node, the samples of all elements adjacent to the node are fitted in the least
//! squares sense by a bilinear polynomial $a + b x + c y + d x y$, which is then evaluated at
//! the node. The fit is linear in the samples, so the adjoint is obtained from the same
//! normal equations.
use crate::error::{check_len, Error, Singularity};
use crate::mesh::QuadMesh;
use crate::nalgebra::{Matrix4, Point2, Vector4, LU, U4};
use crate::quadrature::{quadrilateral_gauss_2x2, QUADRATURE_POINTS_PER_ELEMENT};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryParameters {
    /// Patch systems whose (2-norm) condition number exceeds this value are rejected as
    /// numerically singular.
    pub max_condition_number: f64,
}

impl Default for RecoveryParameters {
    fn default() -> Self {
        Self {
            max_condition_number: 1e12,
        }
    }
}

/// Flattened node-to-element adjacency.
///
/// The patch of node `i` is `elements[offsets[i] .. offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchAdjacency {
    offsets: Vec<usize>,
    elements: Vec<usize>,
}

impl PatchAdjacency {
    /// Builds the adjacency from a per-node element count and the concatenated element lists.
    pub fn from_counts_and_elements(counts: &[usize], elements: Vec<usize>) -> Result<Self, Error> {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        offsets.push(0);
        for count in counts {
            offsets.push(offsets[offsets.len() - 1] + count);
        }
        check_len("patch element list", elements.len(), offsets[counts.len()])?;
        Ok(Self { offsets, elements })
    }

    /// Collects, for every vertex of the mesh, the elements that reference it.
    pub fn from_mesh(mesh: &QuadMesh) -> Self {
        let mut counts = vec![0; mesh.num_nodes()];
        let mut nested: Vec<Vec<usize>> = vec![Vec::new(); mesh.num_nodes()];
        for (element_index, conn) in mesh.connectivity().iter().enumerate() {
            for &node in conn.iter() {
                // Guard against an element that repeats a vertex
                if nested[node].last() != Some(&element_index) {
                    nested[node].push(element_index);
                    counts[node] += 1;
                }
            }
        }
        let elements = nested.into_iter().flatten().collect();
        Self::from_counts_and_elements(&counts, elements).expect("Counts match the collected elements")
    }

    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// The elements adjacent to `node`.
    pub fn patch(&self, node: usize) -> &[usize] {
        &self.elements[self.offsets[node]..self.offsets[node + 1]]
    }

    fn check_mesh(&self, mesh: &QuadMesh) -> Result<(), Error> {
        check_len("patch adjacency", self.num_nodes(), mesh.num_nodes())?;
        match self.elements.iter().find(|&&e| e >= mesh.num_elements()) {
            Some(e) => Err(Error::precondition(format!(
                "patch adjacency references element {e}, but the mesh has only {} elements",
                mesh.num_elements()
            ))),
            None => Ok(()),
        }
    }
}

/// The factorized normal equations of a single patch.
///
/// Sample coordinates are expressed relative to the node and scaled by the patch radius. This
/// leaves the space of bilinear polynomials unchanged, but keeps the system well conditioned
/// regardless of where the patch lies. The fitted value at the node is then the constant
/// coefficient.
struct PatchSystem<'a> {
    samples: Vec<usize>,
    sample_positions: &'a [Point2<f64>],
    origin: Point2<f64>,
    scale: f64,
    lu: LU<f64, U4, U4>,
}

impl<'a> PatchSystem<'a> {
    fn assemble(
        mesh: &QuadMesh,
        patches: &PatchAdjacency,
        sample_positions: &'a [Point2<f64>],
        node: usize,
        parameters: &RecoveryParameters,
    ) -> Result<Self, Error> {
        let singular = Error::NumericallySingular(Singularity::PatchSystem { node });
        let samples: Vec<usize> = patches
            .patch(node)
            .iter()
            .flat_map(|e| QUADRATURE_POINTS_PER_ELEMENT * e..QUADRATURE_POINTS_PER_ELEMENT * (e + 1))
            .collect();

        let origin = mesh.vertices()[node];
        let scale = samples
            .iter()
            .map(|&s| (sample_positions[s] - origin).norm())
            .fold(0.0, f64::max);
        if !(scale > 0.0) || !scale.is_finite() {
            warn!("Rejecting recovery patch of node {node} with no usable samples");
            return Err(singular);
        }

        let mut matrix = Matrix4::zeros();
        for &s in &samples {
            let p = local_basis(&origin, scale, &sample_positions[s]);
            matrix += p * p.transpose();
        }

        let eigenvalues = matrix.symmetric_eigenvalues();
        let (min, max) = (eigenvalues.min(), eigenvalues.max());
        let condition_number = max / min;
        trace!(
            "Recovery patch of node {node}: {} samples, condition number {condition_number:e}",
            samples.len()
        );
        if !(min > 0.0) || !(condition_number <= parameters.max_condition_number) {
            warn!(
                "Rejecting recovery patch of node {node} with condition number {condition_number:e} \
                 (maximum {:e})",
                parameters.max_condition_number
            );
            return Err(singular);
        }

        Ok(Self {
            samples,
            sample_positions,
            origin,
            scale,
            lu: matrix.lu(),
        })
    }

    fn basis(&self, sample: usize) -> Vector4<f64> {
        local_basis(&self.origin, self.scale, &self.sample_positions[sample])
    }

    fn solve(&self, node: usize, rhs: &Vector4<f64>) -> Result<Vector4<f64>, Error> {
        self.lu
            .solve(rhs)
            .ok_or(Error::NumericallySingular(Singularity::PatchSystem { node }))
    }
}

fn local_basis(origin: &Point2<f64>, scale: f64, x: &Point2<f64>) -> Vector4<f64> {
    let d = (x - origin) / scale;
    Vector4::new(1.0, d.x, d.y, d.x * d.y)
}

/// Physical coordinates of all quadrature points, in sample order.
fn sample_positions(mesh: &QuadMesh) -> Vec<Point2<f64>> {
    let (_, points) = quadrilateral_gauss_2x2();
    mesh.elements()
        .flat_map(|(_, _, element)| points.map(|xi| element.map_reference_coords(&xi)))
        .collect()
}

/// Recovers one stress value per node from one stress sample per quadrature point.
///
/// Fails with [`Error::NumericallySingular`] if the patch system of some node is singular or
/// too ill-conditioned, which happens when the patch provides fewer than four independent
/// sample locations.
pub fn recover_nodal_stress(
    mesh: &QuadMesh,
    patches: &PatchAdjacency,
    parameters: &RecoveryParameters,
    samples: &[f64],
) -> Result<Vec<f64>, Error> {
    patches.check_mesh(mesh)?;
    check_len("stress samples", samples.len(), QUADRATURE_POINTS_PER_ELEMENT * mesh.num_elements())?;
    let positions = sample_positions(mesh);

    let mut nodal_stress = Vec::with_capacity(mesh.num_nodes());
    for node in 0..mesh.num_nodes() {
        let system = PatchSystem::assemble(mesh, patches, &positions, node, parameters)?;
        let mut rhs = Vector4::zeros();
        for &s in &system.samples {
            rhs += system.basis(s) * samples[s];
        }
        let coefficients = system.solve(node, &rhs)?;
        nodal_stress.push(coefficients[0]);
    }
    debug!("Recovered nodal stress at {} nodes", mesh.num_nodes());
    Ok(nodal_stress)
}

/// Given the derivative `dfdns` of some functional with respect to every recovered nodal
/// stress, computes its derivative with respect to every stress sample.
///
/// This is the transpose of the linear map applied by [`recover_nodal_stress`].
pub fn recover_nodal_stress_adjoint(
    mesh: &QuadMesh,
    patches: &PatchAdjacency,
    parameters: &RecoveryParameters,
    dfdns: &[f64],
) -> Result<Vec<f64>, Error> {
    patches.check_mesh(mesh)?;
    mesh.check_nodal_field("dfdns", dfdns)?;
    let positions = sample_positions(mesh);

    let mut dfdsamples = vec![0.0; positions.len()];
    for node in 0..mesh.num_nodes() {
        let system = PatchSystem::assemble(mesh, patches, &positions, node, parameters)?;
        // The nodal value is e_0^T A^{-1} b, so each sample enters through A^{-1} e_0
        let y = system.solve(node, &Vector4::x())?;
        for &s in &system.samples {
            dfdsamples[s] += dfdns[node] * y.dot(&system.basis(s));
        }
    }
    Ok(dfdsamples)
}
