//! Linear density filtering on mesh vertices.
use crate::error::{check_len, Error};
use crate::mesh::QuadMesh;
use log::debug;
use nalgebra_sparse::CsrMatrix;
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// A normalized "hat" filter mapping design variables to densities, $\rho = F x$.
///
/// Row $i$ of $F$ has weights proportional to $r_0 - |x_i - x_j|$ for every vertex $j$ closer
/// than the filter radius $r_0$ to vertex $i$, scaled so that the row sums to one.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityFilter {
    matrix: CsrMatrix<f64>,
}

impl DensityFilter {
    pub fn new(mesh: &QuadMesh, radius: f64) -> Result<Self, Error> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(Error::precondition(format!(
                "filter radius must be positive and finite, got {radius}"
            )));
        }

        let points: Vec<_> = mesh
            .vertices()
            .iter()
            .enumerate()
            .map(|(i, v)| GeomWithData::new([v.x, v.y], i))
            .collect();
        let tree = RTree::bulk_load(points);

        let n = mesh.num_nodes();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut neighbors = Vec::new();

        offsets.push(0);
        for v in mesh.vertices() {
            neighbors.clear();
            for neighbor in tree.locate_within_distance([v.x, v.y], radius * radius) {
                let [x, y] = *neighbor.geom();
                let distance = (x - v.x).hypot(y - v.y);
                if distance < radius {
                    neighbors.push((neighbor.data, (radius - distance) / radius));
                }
            }
            neighbors.sort_unstable_by_key(|&(j, _)| j);

            // The vertex itself always contributes weight one, so the sum is positive
            let row_sum: f64 = neighbors.iter().map(|&(_, w)| w).sum();
            for &(j, w) in &neighbors {
                indices.push(j);
                values.push(w / row_sum);
            }
            offsets.push(indices.len());
        }

        debug!(
            "Built density filter with radius {radius} on {n} vertices ({} nonzeros)",
            indices.len()
        );
        let matrix = CsrMatrix::try_from_csr_data(n, n, offsets, indices, values)
            .expect("Filter rows are sorted and free of duplicates");
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    /// Computes $F x$.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>, Error> {
        check_len("design variables", x.len(), self.matrix.ncols())?;
        Ok(self
            .matrix
            .row_iter()
            .map(|row| {
                row.col_indices()
                    .iter()
                    .zip(row.values())
                    .map(|(&j, w)| w * x[j])
                    .sum::<f64>()
            })
            .collect())
    }

    /// Computes $F^T g$, which maps a gradient with respect to the densities to a gradient with
    /// respect to the design variables.
    pub fn apply_transpose(&self, g: &[f64]) -> Result<Vec<f64>, Error> {
        check_len("density gradient", g.len(), self.matrix.nrows())?;
        let mut result = vec![0.0; self.matrix.ncols()];
        for (row, &g_i) in self.matrix.row_iter().zip(g) {
            for (&j, w) in row.col_indices().iter().zip(row.values()) {
                result[j] += w * g_i;
            }
        }
        Ok(result)
    }
}
