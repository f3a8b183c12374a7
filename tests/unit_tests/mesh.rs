use planestress_topo::connectivity::Quad4d2Connectivity;
use planestress_topo::dofs::DofMap;
use planestress_topo::error::Error;
use planestress_topo::mesh::procedural::create_rectangular_uniform_quad_mesh_2d;
use planestress_topo::mesh::QuadMesh;
use planestress_topo::nalgebra::Point2;

#[test]
fn rectangular_mesh_layout() {
    let mesh = create_rectangular_uniform_quad_mesh_2d(2.0, 1.0, 2, 1);
    assert_eq!(mesh.num_nodes(), 6);
    assert_eq!(mesh.num_elements(), 2);
    assert_eq!(mesh.vertices()[4], Point2::new(1.0, 1.0));
    assert_eq!(
        mesh.connectivity(),
        &[Quad4d2Connectivity([0, 1, 4, 3]), Quad4d2Connectivity([1, 2, 5, 4])]
    );

    let empty = create_rectangular_uniform_quad_mesh_2d(1.0, 1.0, 0, 3);
    assert_eq!(empty.num_nodes(), 0);
    assert_eq!(empty.num_elements(), 0);
}

#[test]
fn mesh_rejects_out_of_bounds_connectivity() {
    let vertices = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)];
    let result = QuadMesh::try_from_vertices_and_connectivity(vertices, vec![Quad4d2Connectivity([0, 1, 2, 3])]);
    assert!(matches!(result, Err(Error::PreconditionViolation(_))));
}

#[test]
fn dof_map_gathers_and_scatters_active_slots() {
    let mesh = create_rectangular_uniform_quad_mesh_2d(2.0, 1.0, 2, 1);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[0, 3]);
    assert_eq!(dofs.num_dofs(), 8);

    let conn = &mesh.connectivity()[0];
    assert_eq!(
        dofs.element_dofs(conn),
        [None, None, Some(0), Some(1), Some(4), Some(5), None, None]
    );

    let global: Vec<f64> = (0..8).map(|i| i as f64 + 1.0).collect();
    let local = dofs.gather(conn, &global);
    assert_eq!(local.as_slice(), &[0.0, 0.0, 1.0, 2.0, 5.0, 6.0, 0.0, 0.0]);

    let mut accumulated = vec![0.0; 8];
    dofs.scatter_add(conn, &mut accumulated, &local);
    dofs.scatter_add(conn, &mut accumulated, &local);
    assert_eq!(accumulated, vec![2.0, 4.0, 0.0, 0.0, 10.0, 12.0, 0.0, 0.0]);
}

#[test]
fn dof_map_deserialization_validates_ids() {
    let dofs: DofMap = serde_json::from_str("[[null, 0], [1, 2]]").unwrap();
    assert_eq!(dofs.num_dofs(), 3);
    assert_eq!(dofs.node_dofs(0), [None, Some(0)]);

    assert!(serde_json::from_str::<DofMap>("[[0, 0]]").is_err());
}

#[test]
fn component_constraints() {
    // Roller: only the y component of node 1 is fixed
    let dofs = DofMap::from_constraints(2, |node, component| node == 1 && component == 1);
    assert_eq!(dofs.num_dofs(), 3);
    assert_eq!(dofs.node_dofs(1), [Some(2), None]);
}
