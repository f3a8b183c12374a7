//! Mapping from mesh nodes to active degrees of freedom.
use crate::connectivity::Quad4d2Connectivity;
use crate::element::ElementVector;
use crate::error::Error;
use crate::mesh::QuadMesh;
use serde::{Deserialize, Serialize};

/// Per-node global DOF ids for the $x$ and $y$ displacement components.
///
/// A slot holding `None` has no active DOF (the component is fixed). The active ids are
/// unique and form exactly the range `0 .. num_dofs()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[Option<usize>; 2]>", into = "Vec<[Option<usize>; 2]>")]
pub struct DofMap {
    node_dofs: Vec<[Option<usize>; 2]>,
    num_dofs: usize,
}

impl DofMap {
    pub fn try_new(node_dofs: Vec<[Option<usize>; 2]>) -> Result<Self, Error> {
        let num_dofs = node_dofs.iter().flatten().flatten().count();
        let mut seen = vec![false; num_dofs];
        for (node, slots) in node_dofs.iter().enumerate() {
            for &dof in slots.iter().flatten() {
                match seen.get_mut(dof) {
                    Some(flag) if !*flag => *flag = true,
                    Some(_) => {
                        return Err(Error::precondition(format!(
                            "DOF {dof} (node {node}) is assigned more than once"
                        )))
                    }
                    None => {
                        return Err(Error::precondition(format!(
                            "DOF {dof} (node {node}) is out of range for {num_dofs} active DOFs"
                        )))
                    }
                }
            }
        }
        Ok(Self { node_dofs, num_dofs })
    }

    /// Accepts the signed boundary form where any negative id marks an inactive slot.
    pub fn try_from_signed(node_dofs: &[[i64; 2]]) -> Result<Self, Error> {
        let to_slot = |id: i64| usize::try_from(id).ok();
        Self::try_new(
            node_dofs
                .iter()
                .map(|&[x, y]| [to_slot(x), to_slot(y)])
                .collect(),
        )
    }

    /// Numbers all unconstrained node components sequentially, node by node with $x$ before $y$.
    ///
    /// `is_fixed(node, component)` decides whether a component is constrained.
    pub fn from_constraints(num_nodes: usize, mut is_fixed: impl FnMut(usize, usize) -> bool) -> Self {
        let mut next = 0;
        let node_dofs = (0..num_nodes)
            .map(|node| {
                let mut slots = [None; 2];
                for (component, slot) in slots.iter_mut().enumerate() {
                    if !is_fixed(node, component) {
                        *slot = Some(next);
                        next += 1;
                    }
                }
                slots
            })
            .collect();
        Self {
            node_dofs,
            num_dofs: next,
        }
    }

    /// Fixes both components of every node in `fixed_nodes`.
    pub fn from_fixed_nodes(num_nodes: usize, fixed_nodes: &[usize]) -> Self {
        Self::from_constraints(num_nodes, |node, _| fixed_nodes.contains(&node))
    }

    pub fn num_nodes(&self) -> usize {
        self.node_dofs.len()
    }

    /// The number of active DOFs, i.e. the dimension of the global system.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Global DOF ids of the x and y components of a node.
    ///
    /// # Panics
    ///
    /// Panics if `node` is out of bounds.
    pub fn node_dofs(&self, node: usize) -> [Option<usize>; 2] {
        self.node_dofs[node]
    }

    /// Global DOF ids of the eight local DOFs of an element, ordered `[x0, y0, ..., x3, y3]`.
    ///
    /// # Panics
    ///
    /// Panics if a node index of `conn` is out of bounds.
    pub fn element_dofs(&self, conn: &Quad4d2Connectivity) -> [Option<usize>; 8] {
        let mut dofs = [None; 8];
        for (i, &node) in conn.iter().enumerate() {
            dofs[2 * i..2 * i + 2].copy_from_slice(&self.node_dofs[node]);
        }
        dofs
    }

    /// Gathers a global vector into element-local order, with zeros in inactive slots.
    ///
    /// # Panics
    ///
    /// Panics if a node index of `conn` is out of bounds, or if an active DOF is out of
    /// bounds for `global`.
    pub fn gather(&self, conn: &Quad4d2Connectivity, global: &[f64]) -> ElementVector {
        let dofs = self.element_dofs(conn);
        ElementVector::from_fn(|i, _| dofs[i].map_or(0.0, |dof| global[dof]))
    }

    /// Adds an element-local vector into a global vector, dropping inactive slots.
    ///
    /// # Panics
    ///
    /// Panics if a node index of `conn` is out of bounds, or if an active DOF is out of
    /// bounds for `global`.
    pub fn scatter_add(&self, conn: &Quad4d2Connectivity, global: &mut [f64], local: &ElementVector) {
        for (dof, value) in self.element_dofs(conn).iter().zip(local.iter()) {
            if let Some(dof) = dof {
                global[*dof] += value;
            }
        }
    }

    pub(crate) fn check_mesh(&self, mesh: &QuadMesh) -> Result<(), Error> {
        if self.num_nodes() == mesh.num_nodes() {
            Ok(())
        } else {
            Err(Error::precondition(format!(
                "DOF map covers {} nodes, but the mesh has {} nodes",
                self.num_nodes(),
                mesh.num_nodes()
            )))
        }
    }

    pub(crate) fn check_dof_vector(&self, name: &str, vector: &[f64]) -> Result<(), Error> {
        crate::error::check_len(name, vector.len(), self.num_dofs)
    }
}

impl TryFrom<Vec<[Option<usize>; 2]>> for DofMap {
    type Error = Error;

    fn try_from(node_dofs: Vec<[Option<usize>; 2]>) -> Result<Self, Self::Error> {
        Self::try_new(node_dofs)
    }
}

impl From<DofMap> for Vec<[Option<usize>; 2]> {
    fn from(map: DofMap) -> Self {
        map.node_dofs
    }
}
