//! Element matrices and their assembly into CSR matrices.
use crate::dofs::DofMap;
use crate::element::{strain_displacement_matrix, DegenerateJacobian, ElementMatrix, Quad4d2Element};
use crate::error::Error;
use crate::material::{PlaneStressConstitutive, RampPenalty};
use crate::mesh::QuadMesh;
use crate::nalgebra::Vector4;
use crate::sparsity::PatternAssembler;
use itertools::izip;
use log::debug;
use nalgebra_sparse::CsrMatrix;

/// Computes the penalized element stiffness matrix
/// $$
/// K_e = \sum_q w_q \det J_q \\, p(\rho_q) B_q^T C B_q,
/// $$
/// where $\rho_q$ is the nodal density interpolated at quadrature point $q$.
#[allow(non_snake_case)]
pub fn element_stiffness_matrix(
    element: &Quad4d2Element,
    nodal_density: &Vector4<f64>,
    penalty: &RampPenalty,
    constitutive: &PlaneStressConstitutive,
) -> Result<ElementMatrix, DegenerateJacobian> {
    let C = constitutive.matrix();
    let (weights, values) = element.evaluate_quadrature()?;

    let mut ke = ElementMatrix::zeros();
    for (w, v) in izip!(&weights, &values) {
        let rho = nodal_density.dot(&v.basis);
        let B = strain_displacement_matrix(&v.physical_gradients);
        let scale = w * v.jacobian_det * penalty.value(rho);
        ke += B.transpose() * C * B * scale;
    }
    Ok(ke)
}

/// Computes the element mass matrix
/// $$
/// M_e = \sum_q w_q \det J_q \\, \bar\rho \rho_q N_q^T N_q,
/// $$
/// applied separately to the $x$ and $y$ components, with $\bar\rho$ the material density.
/// The two components do not couple.
pub fn element_mass_matrix(
    element: &Quad4d2Element,
    nodal_density: &Vector4<f64>,
    material_density: f64,
) -> Result<ElementMatrix, DegenerateJacobian> {
    let (weights, values) = element.evaluate_quadrature()?;

    let mut me = ElementMatrix::zeros();
    for (w, v) in izip!(&weights, &values) {
        let rho = nodal_density.dot(&v.basis);
        let scale = w * v.jacobian_det * material_density * rho;
        let nn = v.basis * v.basis.transpose() * scale;
        for a in 0..4 {
            for b in 0..4 {
                me[(2 * a, 2 * b)] += nn[(a, b)];
                me[(2 * a + 1, 2 * b + 1)] += nn[(a, b)];
            }
        }
    }
    Ok(me)
}

/// Assembles the global stiffness matrix into a matrix with a precomputed pattern.
///
/// All values of `csr` are overwritten. The pattern must contain every entry coupling two
/// active DOFs of a common element, otherwise a precondition violation is returned and the
/// values of `csr` are left in an unspecified state.
pub fn assemble_stiffness_into(
    csr: &mut CsrMatrix<f64>,
    mesh: &QuadMesh,
    dofs: &DofMap,
    density: &[f64],
    penalty: &RampPenalty,
    constitutive: &PlaneStressConstitutive,
) -> Result<(), Error> {
    assemble_into_csr(csr, mesh, dofs, density, |element, nodal_density| {
        element_stiffness_matrix(element, nodal_density, penalty, constitutive)
    })
}

/// Assembles the global mass matrix into a matrix with a precomputed pattern.
///
/// See [`assemble_stiffness_into`] for the requirements on the pattern.
pub fn assemble_mass_into(
    csr: &mut CsrMatrix<f64>,
    mesh: &QuadMesh,
    dofs: &DofMap,
    density: &[f64],
    material_density: f64,
) -> Result<(), Error> {
    assemble_into_csr(csr, mesh, dofs, density, |element, nodal_density| {
        element_mass_matrix(element, nodal_density, material_density)
    })
}

/// Computes the pattern and assembles the global stiffness matrix.
pub fn assemble_stiffness(
    mesh: &QuadMesh,
    dofs: &DofMap,
    density: &[f64],
    penalty: &RampPenalty,
    constitutive: &PlaneStressConstitutive,
) -> Result<CsrMatrix<f64>, Error> {
    let mut csr = zeroed_matrix(mesh, dofs)?;
    assemble_stiffness_into(&mut csr, mesh, dofs, density, penalty, constitutive)?;
    Ok(csr)
}

/// Computes the pattern and assembles the global mass matrix.
pub fn assemble_mass(
    mesh: &QuadMesh,
    dofs: &DofMap,
    density: &[f64],
    material_density: f64,
) -> Result<CsrMatrix<f64>, Error> {
    let mut csr = zeroed_matrix(mesh, dofs)?;
    assemble_mass_into(&mut csr, mesh, dofs, density, material_density)?;
    Ok(csr)
}

fn zeroed_matrix(mesh: &QuadMesh, dofs: &DofMap) -> Result<CsrMatrix<f64>, Error> {
    let pattern = PatternAssembler::default().assemble_pattern(mesh, dofs)?;
    let values = vec![0.0; pattern.nnz()];
    Ok(CsrMatrix::try_from_pattern_and_values(pattern, values)
        .expect("Number of values always matches the pattern"))
}

fn assemble_into_csr(
    csr: &mut CsrMatrix<f64>,
    mesh: &QuadMesh,
    dofs: &DofMap,
    density: &[f64],
    element_matrix: impl Fn(&Quad4d2Element, &Vector4<f64>) -> Result<ElementMatrix, DegenerateJacobian>,
) -> Result<(), Error> {
    dofs.check_mesh(mesh)?;
    mesh.check_nodal_field("density", density)?;
    let nvars = dofs.num_dofs();
    if csr.nrows() != nvars || csr.ncols() != nvars {
        return Err(Error::precondition(format!(
            "matrix is {}x{}, but there are {} active DOFs",
            csr.nrows(),
            csr.ncols(),
            nvars
        )));
    }

    csr.values_mut().fill(0.0);
    for (element_index, conn, element) in mesh.elements() {
        let nodal_density = conn.gather(density);
        let matrix = element_matrix(&element, &nodal_density).map_err(|err| err.in_element(element_index))?;
        add_element_matrix_to_csr(csr, &dofs.element_dofs(conn), &matrix)?;
    }

    debug!(
        "Assembled {} elements into {}x{} matrix with {} nonzeros",
        mesh.num_elements(),
        nvars,
        nvars,
        csr.nnz()
    );
    Ok(())
}

fn add_element_matrix_to_csr(
    csr: &mut CsrMatrix<f64>,
    element_dofs: &[Option<usize>; 8],
    matrix: &ElementMatrix,
) -> Result<(), Error> {
    for (i, row_dof) in element_dofs.iter().enumerate() {
        let Some(row_dof) = *row_dof else { continue };
        let mut row = csr.row_mut(row_dof);
        let (column_indices, values) = row.cols_and_values_mut();

        for (j, col_dof) in element_dofs.iter().enumerate() {
            let Some(col_dof) = *col_dof else { continue };
            // Rows are short, so a linear scan is sufficient
            let idx = column_indices
                .iter()
                .position(|&c| c == col_dof)
                .ok_or_else(|| {
                    Error::precondition(format!(
                        "sparsity pattern is missing entry ({row_dof}, {col_dof})"
                    ))
                })?;
            values[idx] += matrix[(i, j)];
        }
    }
    Ok(())
}
