//! Integration tests for the stepper contracts
//!
//! Boundary values, solve counts and error propagation, checked through
//! the public API only.

use std::f64::consts::PI;
use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

use parabolic_rs::error::StepperError;
use parabolic_rs::linalg::{KrylovMethod, PreconditionerKind, SolverSettings};
use parabolic_rs::models::Heat1d;
use parabolic_rs::problem::{
    BoundaryExpression, BoundaryRegion, DirichletBc, Linearization, ParabolicProblem,
    SymbolicDirichletBc,
};
use parabolic_rs::solver::{
    ButcherTableau, Dummy, ExplicitEuler, ImplicitEuler, RungeKutta, SolverConfiguration,
    StepperBase, TimeStepper, Trapezoidal, integrate,
};

mod common;
use common::{CountingSolver, heat_affine, heat_sine, tight};

fn counted(heat: Heat1d) -> (StepperBase<Heat1d>, CountingSolver) {
    let counter = CountingSolver::new();
    let base = StepperBase::new(heat)
        .unwrap()
        .with_solver(Arc::new(counter.clone()));
    (base, counter)
}

// =================================================================================================
// Dirichlet Values
// =================================================================================================

fn assert_boundary_values(stepper: &dyn TimeStepper, elements: usize, dt: f64) {
    let u0 = heat_affine(elements).interpolate(|x| 1.0 + x[0] + (PI * x[0]).sin());
    let u1 = stepper.step(&u0, 0.0, dt, &tight(stepper)).unwrap();

    assert_relative_eq!(u1[0], dt.exp(), epsilon = 1e-8);
    assert_relative_eq!(u1[elements], 2.0 * dt.exp(), epsilon = 1e-8);
}

#[test]
fn test_constrained_dofs_match_prescribed_values() {
    let elements = 16;
    let dt = 1e-3;

    let explicit = ExplicitEuler::from_problem(heat_affine(elements)).unwrap();
    assert_boundary_values(&explicit, elements, dt);

    let implicit = ImplicitEuler::from_problem(heat_affine(elements)).unwrap();
    assert_boundary_values(&implicit, elements, dt);

    let trapezoidal = Trapezoidal::from_problem(heat_affine(elements)).unwrap();
    assert_boundary_values(&trapezoidal, elements, dt);

    let heat = heat_affine(elements);
    let bcs = heat.boundary_conditions();
    let rk4 = RungeKutta::rk4(StepperBase::new(heat).unwrap(), &bcs).unwrap();
    assert_boundary_values(&rk4, elements, dt);
}

#[test]
fn test_boundary_values_along_a_trajectory() {
    let stepper = ImplicitEuler::from_problem(heat_affine(8)).unwrap();
    let u0 = heat_affine(8).interpolate(|x| 1.0 + x[0] + (PI * x[0]).sin());
    let config = SolverConfiguration::time_evolution(0.5, 5).with_settings(tight(&stepper));

    let result = integrate(&stepper, &u0, &config).unwrap();

    for (t, state) in result.time_points.iter().zip(&result.state_trajectory) {
        assert_relative_eq!(state[0], t.exp(), epsilon = 1e-8);
        assert_relative_eq!(state[8], 2.0 * t.exp(), epsilon = 1e-8);
    }
}

// =================================================================================================
// Solve Counts
// =================================================================================================

#[test]
fn test_dummy_returns_copy_without_solving() {
    let u0 = DVector::from_vec(vec![1.0, -2.0, 3.5]);
    let u1 = Dummy.step(&u0, 0.0, 0.1, &Dummy.default_settings()).unwrap();
    assert_eq!(u1, u0);

    let result = integrate(&Dummy, &u0, &SolverConfiguration::time_evolution(1.0, 4)).unwrap();
    assert!(result.state_trajectory.iter().all(|state| *state == u0));
}

#[test]
fn test_single_step_schemes_solve_once_per_step() {
    let u0 = heat_sine(8).interpolate(|x| (PI * x[0]).sin());
    let steps = 3;
    let config = SolverConfiguration::time_evolution(0.01, steps);

    let (base, counter) = counted(heat_sine(8));
    integrate(&ExplicitEuler::new(base), &u0, &config).unwrap();
    assert_eq!(counter.solves(), steps);

    let (base, counter) = counted(heat_sine(8));
    integrate(&ImplicitEuler::new(base), &u0, &config).unwrap();
    assert_eq!(counter.solves(), steps);

    let (base, counter) = counted(heat_sine(8));
    integrate(&Trapezoidal::new(base), &u0, &config).unwrap();
    assert_eq!(counter.solves(), steps);
}

#[test]
fn test_runge_kutta_solves_stages_plus_one() {
    let u0 = heat_sine(8).interpolate(|x| (PI * x[0]).sin());
    let bcs = heat_sine(8).boundary_conditions();

    for tableau in [
        ButcherTableau::heun(0.5).unwrap(),
        ButcherTableau::rk4(),
        ButcherTableau::rkf45(),
    ] {
        let stages = tableau.stages();
        let (base, counter) = counted(heat_sine(8));
        let stepper = RungeKutta::new(base, tableau, &bcs).unwrap();

        stepper
            .step(&u0, 0.0, 1e-3, &stepper.default_settings())
            .unwrap();
        assert_eq!(counter.solves(), stages + 1, "{}", stepper.name());
    }
}

// =================================================================================================
// Contract Violations
// =================================================================================================

#[test]
fn test_implicit_tableau_is_rejected() {
    // implicit midpoint rule
    let result = ButcherTableau::new(
        "Implicit Midpoint",
        2,
        DMatrix::from_element(1, 1, 0.5),
        DVector::from_element(1, 1.0),
        DVector::from_element(1, 0.5),
    );

    let err = result.unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(
        err,
        StepperError::ImplicitTableau {
            row: 0,
            col: 0,
            value: 0.5
        }
    );
}

#[test]
fn test_boundary_without_time_derivative_is_rejected() {
    let heat = Heat1d::new(4)
        .unwrap()
        .with_boundary_values(BoundaryExpression::new(|_, t| t), BoundaryExpression::constant(0.0));
    let bcs = heat.boundary_conditions();

    let result = RungeKutta::rk4(StepperBase::new(heat).unwrap(), &bcs);
    assert_eq!(
        result.unwrap_err(),
        StepperError::MissingDerivative { order: 1 }
    );
}

#[test]
fn test_out_of_range_boundary_dof_is_rejected() {
    let region = BoundaryRegion::new(vec![9], vec![vec![2.0]]).unwrap();
    let bcs = [SymbolicDirichletBc::new(region, BoundaryExpression::constant(0.0))];

    let result = RungeKutta::heun(StepperBase::new(heat_sine(4)).unwrap(), &bcs);
    assert!(matches!(result, Err(StepperError::DimensionMismatch { .. })));
}

/// Heat model whose source vector is one entry short
struct ShortSource(Heat1d);

impl ParabolicProblem for ShortSource {
    fn mass(&self) -> CsrMatrix<f64> {
        self.0.mass()
    }

    fn get_system(&self, t: f64) -> Result<Linearization, StepperError> {
        let system = self.0.get_system(t)?;
        let n = system.source.len();
        Ok(Linearization::new(system.operator, system.source.rows(0, n - 1).into_owned()))
    }

    fn get_bcs(&self, t: f64) -> Result<Vec<DirichletBc>, StepperError> {
        self.0.get_bcs(t)
    }
}

#[test]
fn test_dimension_mismatch_stops_before_any_solve() {
    let counter = CountingSolver::new();
    let base = StepperBase::new(ShortSource(heat_sine(4)))
        .unwrap()
        .with_solver(Arc::new(counter.clone()));
    let stepper = ImplicitEuler::new(base);

    let err = stepper
        .step(&DVector::zeros(5), 0.0, 0.1, &stepper.default_settings())
        .unwrap_err();

    assert_eq!(err, StepperError::dimension("source vector", 5, 4));
    assert_eq!(counter.solves(), 0);
}

#[test]
fn test_wrong_state_length_is_rejected() {
    let stepper = Trapezoidal::from_problem(heat_sine(4)).unwrap();
    let err = stepper
        .step(&DVector::zeros(4), 0.0, 0.1, &stepper.default_settings())
        .unwrap_err();
    assert!(err.is_contract_violation());
}

/// Provider that fails at a given time
struct Failing;

impl ParabolicProblem for Failing {
    fn mass(&self) -> CsrMatrix<f64> {
        CsrMatrix::identity(2)
    }

    fn get_system(&self, t: f64) -> Result<Linearization, StepperError> {
        if t > 0.25 {
            return Err(StepperError::Provider(format!("no data beyond t = {t}")));
        }
        Ok(Linearization::new(CsrMatrix::identity(2), DVector::zeros(2)))
    }

    fn get_bcs(&self, _t: f64) -> Result<Vec<DirichletBc>, StepperError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_provider_failure_propagates() {
    let stepper = ImplicitEuler::from_problem(Failing).unwrap();
    let u0 = DVector::from_element(2, 1.0);

    let result = integrate(&stepper, &u0, &SolverConfiguration::time_evolution(1.0, 10));
    assert!(matches!(result, Err(StepperError::Provider(_))));
}

// =================================================================================================
// Solver Failures
// =================================================================================================

#[test]
fn test_iteration_cap_is_an_error() {
    let heat = heat_sine(64);
    let u0 = heat.interpolate(|x| (PI * x[0]).sin());
    let stepper = ImplicitEuler::from_problem(heat).unwrap();

    let settings = SolverSettings::general()
        .with_method(KrylovMethod::Cg)
        .with_preconditioner(PreconditionerKind::None)
        .with_max_iterations(1);

    let err = stepper.step(&u0, 0.0, 0.1, &settings).unwrap_err();
    assert!(err.is_solver_failure());
    assert!(matches!(err, StepperError::NotConverged { iterations: 1, .. }));
}

#[test]
fn test_invalid_settings_are_rejected() {
    let stepper = ExplicitEuler::from_problem(heat_sine(4)).unwrap();
    let u0 = DVector::zeros(5);
    let settings = SolverSettings::symmetric().with_tolerance(-1.0);

    let err = stepper.step(&u0, 0.0, 0.1, &settings).unwrap_err();
    assert!(matches!(err, StepperError::InvalidConfiguration(_)));
}
