use crate::connectivity::Quad4d2Connectivity;
use crate::element::{IsoparametricValues, Quad4d2Element};
use crate::error::Error;
use crate::nalgebra::Point2;
use serde::Serialize;

pub mod procedural;

/// A conforming mesh of bilinear quadrilaterals in two dimensions.
///
/// Every connectivity index is guaranteed to refer to an existing vertex, so that element
/// routines may index the vertex array directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadMesh {
    vertices: Vec<Point2<f64>>,
    connectivity: Vec<Quad4d2Connectivity>,
}

impl QuadMesh {
    /// Construct a mesh from vertices and connectivity.
    ///
    /// Fails with a precondition violation if some element references a vertex that does
    /// not exist.
    pub fn try_from_vertices_and_connectivity(
        vertices: Vec<Point2<f64>>,
        connectivity: Vec<Quad4d2Connectivity>,
    ) -> Result<Self, Error> {
        for (element_index, conn) in connectivity.iter().enumerate() {
            if let Some(&node) = conn.iter().find(|&&node| node >= vertices.len()) {
                return Err(Error::precondition(format!(
                    "element {element_index} references vertex {node}, but the mesh has only {} vertices",
                    vertices.len()
                )));
            }
        }
        Ok(Self { vertices, connectivity })
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Quad4d2Connectivity] {
        &self.connectivity
    }

    pub fn num_nodes(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.len()
    }

    /// # Panics
    ///
    /// Panics if `index` is not a valid element index.
    pub fn element(&self, index: usize) -> Quad4d2Element {
        let [a, b, c, d] = self.connectivity[index].0;
        let v = &self.vertices;
        Quad4d2Element::from_vertices([v[a], v[b], v[c], v[d]])
    }

    /// Iterates over `(element index, connectivity, geometry)` for all elements.
    pub fn elements(&self) -> impl Iterator<Item = (usize, &Quad4d2Connectivity, Quad4d2Element)> + '_ {
        self.connectivity
            .iter()
            .enumerate()
            .map(move |(i, conn)| (i, conn, self.element(i)))
    }

    /// Visits every quadrature point of every element in sample order.
    ///
    /// The visitor receives the element index, its connectivity, the quadrature point index,
    /// the integration weight scaled by the Jacobian determinant and the isoparametric values.
    pub(crate) fn for_each_quadrature_point<F>(&self, mut visit: F) -> Result<(), Error>
    where
        F: FnMut(usize, &Quad4d2Connectivity, usize, f64, &IsoparametricValues) -> Result<(), Error>,
    {
        for (element_index, conn, element) in self.elements() {
            let (weights, values) = element
                .evaluate_quadrature()
                .map_err(|err| err.in_element(element_index))?;
            for (q, (w, v)) in weights.iter().zip(&values).enumerate() {
                visit(element_index, conn, q, w * v.jacobian_det, v)?;
            }
        }
        Ok(())
    }

    /// Checks that a nodal field has one value per mesh vertex.
    pub(crate) fn check_nodal_field(&self, name: &str, field: &[f64]) -> Result<(), Error> {
        crate::error::check_len(name, field.len(), self.num_nodes())
    }
}
