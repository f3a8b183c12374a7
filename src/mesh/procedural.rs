//! Basic procedural mesh generation routines.
use crate::connectivity::Quad4d2Connectivity;
use crate::mesh::QuadMesh;
use crate::nalgebra::Point2;

pub fn create_unit_square_uniform_quad_mesh_2d(cells_per_dim: usize) -> QuadMesh {
    create_rectangular_uniform_quad_mesh_2d(1.0, 1.0, cells_per_dim, cells_per_dim)
}

/// Generates an axis-aligned rectangular uniform mesh covering $[0, w] \times [0, h]$.
///
/// Vertex $(i, j)$, counting `i` along $x$ and `j` along $y$, gets index
/// `j * (cells_x + 1) + i`. Elements are numbered row by row from the bottom, with
/// counter-clockwise connectivity. If either cell count is zero, the mesh is empty.
pub fn create_rectangular_uniform_quad_mesh_2d(width: f64, height: f64, cells_x: usize, cells_y: usize) -> QuadMesh {
    if cells_x == 0 || cells_y == 0 {
        return QuadMesh::try_from_vertices_and_connectivity(Vec::new(), Vec::new())
            .expect("An empty mesh is always valid");
    }

    let num_vertices_x = cells_x + 1;
    let num_vertices_y = cells_y + 1;
    let dx = width / cells_x as f64;
    let dy = height / cells_y as f64;

    let to_global_vertex_index = |i, j| num_vertices_x * j + i;

    let mut vertices = Vec::with_capacity(num_vertices_x * num_vertices_y);
    for j in 0..num_vertices_y {
        for i in 0..num_vertices_x {
            vertices.push(Point2::new(i as f64 * dx, j as f64 * dy));
        }
    }

    let mut cells = Vec::with_capacity(cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            cells.push(Quad4d2Connectivity([
                to_global_vertex_index(i, j),
                to_global_vertex_index(i + 1, j),
                to_global_vertex_index(i + 1, j + 1),
                to_global_vertex_index(i, j + 1),
            ]));
        }
    }

    QuadMesh::try_from_vertices_and_connectivity(vertices, cells)
        .expect("Generated connectivity only references generated vertices")
}
