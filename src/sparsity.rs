//! Construction of CSR sparsity patterns from mesh connectivity.
use crate::dofs::DofMap;
use crate::error::{check_len, Error};
use crate::mesh::QuadMesh;
use log::debug;
use nalgebra_sparse::pattern::SparsityPattern;
use std::cell::RefCell;

/// Number of column slots reserved per active element DOF before deduplication.
const COLUMNS_PER_ELEMENT_ROW: usize = 8;

/// Builds the nonzero pattern of global operators.
///
/// The pattern contains the entry $(i, j)$ if and only if DOFs $i$ and $j$ are both active
/// and belong to a common element. Rows are sorted and free of duplicates.
#[derive(Debug, Default)]
pub struct PatternAssembler {
    // Buffers reused across calls
    workspace: RefCell<PatternWorkspace>,
}

#[derive(Debug, Default)]
struct PatternWorkspace {
    /// Next free slot in the provisional segment of each row.
    row_cursor: Vec<usize>,
    /// `marker[j]` is set while column `j` has been seen in the current row, and cleared
    /// again before moving on to the next row.
    marker: Vec<bool>,
}

impl PatternAssembler {
    /// Computes the pattern into caller-provided buffers and returns the number of nonzeros.
    ///
    /// `row_offsets` must have length `dofs.num_dofs() + 1`. The length of `column_indices`
    /// is its capacity. The routine first computes an upper bound on the number of entries
    /// (8 per active DOF per element); if this exceeds the capacity, it fails with
    /// [`Error::InsufficientCapacity`] holding the bound and leaves both buffers untouched.
    /// The caller may then reallocate and call again.
    ///
    /// On success with `nnz` entries, `row_offsets` holds the final offsets and
    /// `column_indices[..nnz]` the sorted column indices of each row.
    pub fn compute_pattern_into(
        &self,
        mesh: &QuadMesh,
        dofs: &DofMap,
        row_offsets: &mut [usize],
        column_indices: &mut [usize],
    ) -> Result<usize, Error> {
        dofs.check_mesh(mesh)?;
        let nvars = dofs.num_dofs();
        check_len("row_offsets", row_offsets.len(), nvars + 1)?;

        let ws = &mut *self.workspace.borrow_mut();
        let row_cursor = &mut ws.row_cursor;

        // Overcount pass: assume every local DOF couples to all local DOFs of the element.
        // Offsets stay in the workspace until the capacity check has passed.
        row_cursor.clear();
        row_cursor.resize(nvars + 1, 0);
        for conn in mesh.connectivity() {
            for dof in dofs.element_dofs(conn).iter().flatten() {
                row_cursor[dof + 1] += COLUMNS_PER_ELEMENT_ROW;
            }
        }
        for i in 0..nvars {
            row_cursor[i + 1] += row_cursor[i];
        }

        let required = row_cursor[nvars];
        if required > column_indices.len() {
            debug!(
                "Column capacity {} is insufficient for pattern, {} entries required",
                column_indices.len(),
                required
            );
            return Err(Error::InsufficientCapacity { required });
        }

        row_offsets.copy_from_slice(&row_cursor[..]);
        row_cursor.truncate(nvars);
        ws.marker.clear();
        ws.marker.resize(nvars, false);
        let marker = &mut ws.marker;

        // Fill pass: write all couplings into the provisional row segments
        for conn in mesh.connectivity() {
            let element_dofs = dofs.element_dofs(conn);
            for row in element_dofs.iter().flatten() {
                for col in element_dofs.iter().flatten() {
                    column_indices[row_cursor[*row]] = *col;
                    row_cursor[*row] += 1;
                }
            }
        }

        // Deduplicate and compact each row in place. The write position never overtakes the
        // read position, since every row has at most as many unique entries as provisional slots.
        let mut nnz = 0;
        for row in 0..nvars {
            let row_begin = nnz;
            for k in row_offsets[row]..row_cursor[row] {
                let col = column_indices[k];
                if !marker[col] {
                    marker[col] = true;
                    column_indices[nnz] = col;
                    nnz += 1;
                }
            }
            let compacted = &mut column_indices[row_begin..nnz];
            for &col in compacted.iter() {
                marker[col] = false;
            }
            compacted.sort_unstable();
            row_offsets[row] = row_begin;
        }
        row_offsets[nvars] = nnz;

        debug!(
            "Computed sparsity pattern with {} rows and {} nonzeros (upper bound {})",
            nvars, nnz, required
        );
        Ok(nnz)
    }

    /// Computes the pattern with freshly allocated buffers.
    ///
    /// Performs a size query with an empty column buffer, allocates the required capacity
    /// and computes the pattern.
    pub fn assemble_pattern(&self, mesh: &QuadMesh, dofs: &DofMap) -> Result<SparsityPattern, Error> {
        let nvars = dofs.num_dofs();
        let mut row_offsets = vec![0; nvars + 1];
        let mut column_indices = Vec::new();

        let nnz = match self.compute_pattern_into(mesh, dofs, &mut row_offsets, &mut column_indices) {
            Ok(nnz) => nnz,
            Err(Error::InsufficientCapacity { required }) => {
                column_indices.resize(required, 0);
                self.compute_pattern_into(mesh, dofs, &mut row_offsets, &mut column_indices)?
            }
            Err(err) => return Err(err),
        };
        column_indices.truncate(nnz);

        Ok(
            SparsityPattern::try_from_offsets_and_indices(nvars, nvars, row_offsets, column_indices)
                .expect("Pattern construction always produces sorted, duplicate-free rows"),
        )
    }
}
