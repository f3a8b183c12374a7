use crate::{distorted_grid_mesh, scattered_field};
use matrixcompare::assert_scalar_eq;
use planestress_topo::dofs::DofMap;
use planestress_topo::error::{Error, Singularity};
use planestress_topo::material::{PlaneStressConstitutive, StressRelaxation, YoungPoisson};
use planestress_topo::mesh::procedural::create_unit_square_uniform_quad_mesh_2d;
use planestress_topo::nalgebra::Vector3;
use planestress_topo::stress::{
    compute_stress_density_derivative, compute_stress_state_derivative, evaluate_stress, von_mises,
    von_mises_gradient, StressContext,
};
use proptest::prelude::*;
use util::{approximate_gradient, assert_approx_matrix_eq, assert_approx_slice_eq, dot};

fn constitutive() -> PlaneStressConstitutive {
    YoungPoisson {
        young: 1.0,
        poisson: 0.3,
    }
    .into()
}

#[test]
fn von_mises_of_uniaxial_and_shear_states() {
    assert_scalar_eq!(von_mises(&Vector3::new(2.0, 0.0, 0.0)), 2.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(von_mises(&Vector3::new(1.0, 1.0, 0.0)), 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(von_mises(&Vector3::new(0.0, 0.0, 1.0)), 3.0f64.sqrt(), comp = abs, tol = 1e-15);
    assert_eq!(von_mises_gradient(&Vector3::zeros()), None);
}

#[test]
fn uniform_strain_gives_uniform_stress() {
    let mesh = create_unit_square_uniform_quad_mesh_2d(2);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[]);
    let c = constitutive();
    let relaxation = StressRelaxation::new(0.5);
    let context = StressContext::new(&mesh, &dofs, &c, &relaxation);

    // u = (0.01 x, -0.002 y + 0.004 x)
    let mut displacement = vec![0.0; dofs.num_dofs()];
    for (node, x) in mesh.vertices().iter().enumerate() {
        displacement[2 * node] = 0.01 * x.x;
        displacement[2 * node + 1] = -0.002 * x.y + 0.004 * x.x;
    }
    let expected = von_mises(&(c.matrix() * Vector3::new(0.01, -0.002, 0.004)));

    let density = vec![1.0; mesh.num_nodes()];
    let samples = evaluate_stress(&context, &displacement, &density).unwrap();
    assert_eq!(samples.len(), 4 * mesh.num_elements());
    for sample in &samples {
        assert_scalar_eq!(*sample, expected, comp = abs, tol = 1e-14);
    }

    // At density 1/2 with epsilon 1/2 the relaxation factor is 2/3
    let density = vec![0.5; mesh.num_nodes()];
    let samples = evaluate_stress(&context, &displacement, &density).unwrap();
    for sample in &samples {
        assert_scalar_eq!(*sample, expected * 2.0 / 3.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn density_derivative_matches_finite_differences() {
    let mesh = distorted_grid_mesh(3, 2);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[0, 4]);
    let c = constitutive();
    let relaxation = StressRelaxation::new(0.3);
    let context = StressContext::new(&mesh, &dofs, &c, &relaxation);

    let displacement = scattered_field(dofs.num_dofs(), -1.0, 1.0, 0.8);
    let density = scattered_field(mesh.num_nodes(), 0.2, 1.0, 2.2);
    let dfdstress = scattered_field(context.num_samples(), -1.0, 1.0, 5.5);

    let derivative = compute_stress_density_derivative(&context, &displacement, &density, &dfdstress).unwrap();
    let approx = approximate_gradient(
        |rho| dot(&dfdstress, &evaluate_stress(&context, &displacement, rho).unwrap()),
        &density,
        1e-6,
    );
    assert_approx_slice_eq!(derivative, approx, abstol = 1e-7);
}

#[test]
fn state_derivative_matches_finite_differences() {
    let mesh = distorted_grid_mesh(3, 2);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[0, 4]);
    let c = constitutive();
    let relaxation = StressRelaxation::new(0.3);
    let context = StressContext::new(&mesh, &dofs, &c, &relaxation);

    let displacement = scattered_field(dofs.num_dofs(), -1.0, 1.0, 0.3);
    let density = scattered_field(mesh.num_nodes(), 0.2, 1.0, 1.4);
    let dfdstress = scattered_field(context.num_samples(), -1.0, 1.0, 3.6);

    let derivative = compute_stress_state_derivative(&context, &displacement, &density, &dfdstress).unwrap();
    let approx = approximate_gradient(
        |u| dot(&dfdstress, &evaluate_stress(&context, u, &density).unwrap()),
        &displacement,
        1e-6,
    );
    assert_approx_slice_eq!(derivative, approx, abstol = 1e-6);
}

#[test]
fn vanishing_stress_with_nonzero_weight_is_singular() {
    let mesh = create_unit_square_uniform_quad_mesh_2d(2);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[]);
    let c = constitutive();
    let relaxation = StressRelaxation::new(0.3);
    let context = StressContext::new(&mesh, &dofs, &c, &relaxation);

    let displacement = vec![0.0; dofs.num_dofs()];
    let density = vec![1.0; mesh.num_nodes()];

    // Zero weights skip the non-differentiable samples entirely
    let mut dfdstress = vec![0.0; context.num_samples()];
    let derivative = compute_stress_state_derivative(&context, &displacement, &density, &dfdstress).unwrap();
    assert!(derivative.iter().all(|&d| d == 0.0));

    dfdstress[6] = 1.0;
    let result = compute_stress_state_derivative(&context, &displacement, &density, &dfdstress);
    assert_eq!(
        result,
        Err(Error::NumericallySingular(Singularity::VanishingStress {
            element: 1,
            point: 2
        }))
    );
}

#[test]
fn sample_weights_must_cover_every_quadrature_point() {
    let mesh = create_unit_square_uniform_quad_mesh_2d(1);
    let dofs = DofMap::from_fixed_nodes(mesh.num_nodes(), &[]);
    let c = constitutive();
    let relaxation = StressRelaxation::new(0.3);
    let context = StressContext::new(&mesh, &dofs, &c, &relaxation);
    let result = compute_stress_density_derivative(&context, &[0.0; 8], &[1.0; 4], &[1.0; 3]);
    assert!(matches!(result, Err(Error::PreconditionViolation(_))));
}

proptest! {
    #[test]
    fn von_mises_gradient_matches_finite_differences(
        sx in -10.0..10.0f64,
        sy in -10.0..10.0f64,
        txy in -10.0..10.0f64,
    ) {
        let stress = Vector3::new(sx, sy, txy);
        prop_assume!(von_mises(&stress) > 1e-3);
        let h = 1e-6;
        let approx = Vector3::from_fn(|i, _| {
            let mut plus = stress;
            let mut minus = stress;
            plus[i] += h;
            minus[i] -= h;
            (von_mises(&plus) - von_mises(&minus)) / (2.0 * h)
        });
        let gradient = von_mises_gradient(&stress).unwrap();
        assert_approx_matrix_eq!(gradient, approx, abstol = 1e-5);
    }
}
