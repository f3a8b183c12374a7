use planestress_topo::dofs::DofMap;
use planestress_topo::error::Error;
use planestress_topo::mesh::procedural::create_rectangular_uniform_quad_mesh_2d;
use planestress_topo::mesh::QuadMesh;
use planestress_topo::sparsity::PatternAssembler;
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// All pairs of active DOFs that share an element.
fn brute_force_entries(mesh: &QuadMesh, dofs: &DofMap) -> BTreeSet<(usize, usize)> {
    let mut entries = BTreeSet::new();
    for conn in mesh.connectivity() {
        let element_dofs = dofs.element_dofs(conn);
        for i in element_dofs.iter().flatten() {
            for j in element_dofs.iter().flatten() {
                entries.insert((*i, *j));
            }
        }
    }
    entries
}

#[test]
fn two_element_pattern() {
    let mesh = create_rectangular_uniform_quad_mesh_2d(2.0, 1.0, 2, 1);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[0, 3]);
    let pattern = PatternAssembler::default()
        .assemble_pattern(&mesh, &dofs)
        .unwrap();

    // Every active DOF belongs to the right element, so all of them couple
    assert_eq!(pattern.major_dim(), 8);
    assert_eq!(pattern.nnz(), 64);
}

#[test]
fn insufficient_capacity_reports_required_size() {
    let mesh = create_rectangular_uniform_quad_mesh_2d(3.0, 2.0, 3, 2);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[0, 4, 8]);
    let nvars = dofs.num_dofs();
    let assembler = PatternAssembler::default();

    let mut row_offsets = vec![0; nvars + 1];
    let mut column_indices = vec![0; 10];
    let err = assembler
        .compute_pattern_into(&mesh, &dofs, &mut row_offsets, &mut column_indices)
        .unwrap_err();

    // 8 slots for every active DOF of every element
    let expected_required: usize = mesh
        .connectivity()
        .iter()
        .map(|conn| 8 * dofs.element_dofs(conn).iter().flatten().count())
        .sum();
    assert_eq!(err, Error::InsufficientCapacity { required: expected_required });

    // Retrying with the reported capacity succeeds
    let mut column_indices = vec![0; expected_required];
    let nnz = assembler
        .compute_pattern_into(&mesh, &dofs, &mut row_offsets, &mut column_indices)
        .unwrap();

    let pattern = assembler.assemble_pattern(&mesh, &dofs).unwrap();
    assert_eq!(nnz, pattern.nnz());
    assert_eq!(row_offsets.as_slice(), pattern.major_offsets());
    assert_eq!(&column_indices[..nnz], pattern.minor_indices());
}

#[test]
fn insufficient_capacity_leaves_buffers_untouched() {
    let mesh = create_rectangular_uniform_quad_mesh_2d(3.0, 2.0, 3, 2);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[0, 4, 8]);
    let assembler = PatternAssembler::default();
    let pattern = assembler.assemble_pattern(&mesh, &dofs).unwrap();

    // Buffers holding a valid pattern, with exactly enough room for the deduplicated entries
    // but less than the upper bound required up front
    let mut row_offsets = pattern.major_offsets().to_vec();
    let mut column_indices = pattern.minor_indices().to_vec();
    let result = assembler.compute_pattern_into(&mesh, &dofs, &mut row_offsets, &mut column_indices);

    assert!(matches!(result, Err(Error::InsufficientCapacity { required }) if required > pattern.nnz()));
    assert_eq!(row_offsets.as_slice(), pattern.major_offsets());
    assert_eq!(column_indices.as_slice(), pattern.minor_indices());
}

#[test]
fn offsets_of_wrong_length_are_rejected() {
    let mesh = create_rectangular_uniform_quad_mesh_2d(1.0, 1.0, 1, 1);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[]);
    let mut row_offsets = vec![0; 3];
    let mut column_indices = vec![0; 100];
    let result = PatternAssembler::default().compute_pattern_into(&mesh, &dofs, &mut row_offsets, &mut column_indices);
    assert!(matches!(result, Err(Error::PreconditionViolation(_))));
}

proptest! {
    #[test]
    fn pattern_matches_brute_force(
        (cells_x, cells_y, fixed) in (1..5usize, 1..4usize).prop_flat_map(|(nx, ny)| {
            let num_nodes = (nx + 1) * (ny + 1);
            (Just(nx), Just(ny), vec(any::<bool>(), num_nodes))
        })
    ) {
        let mesh = create_rectangular_uniform_quad_mesh_2d(cells_x as f64, cells_y as f64, cells_x, cells_y);
        let fixed_nodes: Vec<usize> = fixed.iter().enumerate().filter(|&(_, &f)| f).map(|(i, _)| i).collect();
        let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &fixed_nodes);

        // Reuse one assembler to exercise its workspace across calls
        let assembler = PatternAssembler::default();
        let _ = assembler.assemble_pattern(&mesh, &dofs).unwrap();
        let pattern = assembler.assemble_pattern(&mesh, &dofs).unwrap();

        let offsets = pattern.major_offsets();
        prop_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        for row in 0..pattern.major_dim() {
            let lane = pattern.lane(row);
            prop_assert!(lane.windows(2).all(|w| w[0] < w[1]));
        }

        let entries: BTreeSet<_> = pattern.entries().collect();
        prop_assert_eq!(&entries, &brute_force_entries(&mesh, &dofs));
        prop_assert!(entries.iter().all(|&(i, j)| entries.contains(&(j, i))));
    }
}
