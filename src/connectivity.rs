use crate::nalgebra::Vector4;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Connectivity for a two-dimensional bilinear quadrilateral.
///
/// Node indices are zero-based and ordered counter-clockwise, starting with the node that maps
/// to the reference corner $(-1, -1)$:
///
/// ```text
/// 3_________2
/// |         |
/// |         |
/// |         |
/// 0_________1
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad4d2Connectivity(pub [usize; 4]);

impl Deref for Quad4d2Connectivity {
    type Target = [usize; 4];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Quad4d2Connectivity {
    /// Gathers the values of a nodal field at the nodes of this element.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds for `nodal_values`.
    pub fn gather(&self, nodal_values: &[f64]) -> Vector4<f64> {
        let [a, b, c, d] = self.0;
        Vector4::new(nodal_values[a], nodal_values[b], nodal_values[c], nodal_values[d])
    }

    /// Adds per-node element contributions into a global nodal array.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds for `nodal_values`.
    pub fn scatter_add(&self, nodal_values: &mut [f64], local: &Vector4<f64>) {
        for (&node, &value) in self.0.iter().zip(local.iter()) {
            nodal_values[node] += value;
        }
    }
}
