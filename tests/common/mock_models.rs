//! Mock providers for testing
//!
//! These problems have known analytical solutions, making them
//! ideal for validating temporal accuracy.

use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use parabolic_rs::error::StepperError;
use parabolic_rs::linalg::{KrylovSolver, LinearSolver, SolveRequest};
use parabolic_rs::models::Heat1d;
use parabolic_rs::problem::{BoundaryExpression, DirichletBc, Linearization, ParabolicProblem};

// =================================================================================================
// Scalar Decay: u' = -k u
// =================================================================================================

/// Exponential decay on a single dof, no constraints
///
/// Analytical solution: u(t) = u0 exp(-k t)
pub struct ScalarDecay {
    pub rate: f64,
}

impl ScalarDecay {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn analytical_solution(&self, t: f64, u0: f64) -> f64 {
        u0 * (-self.rate * t).exp()
    }
}

impl ParabolicProblem for ScalarDecay {
    fn mass(&self) -> CsrMatrix<f64> {
        CsrMatrix::identity(1)
    }

    fn get_system(&self, _t: f64) -> Result<Linearization, StepperError> {
        let mut operator = CsrMatrix::identity(1);
        operator.values_mut()[0] = self.rate;
        Ok(Linearization::new(operator, DVector::zeros(1)))
    }

    fn get_bcs(&self, _t: f64) -> Result<Vec<DirichletBc>, StepperError> {
        Ok(Vec::new())
    }
}

// =================================================================================================
// Manufactured Heat Problems
// =================================================================================================

/// `u = e^t sin(pi x)`: homogeneous Dirichlet data
pub fn heat_sine(elements: usize) -> Heat1d {
    Heat1d::new(elements)
        .unwrap()
        .with_source(|x, t| (1.0 + PI * PI) * t.exp() * (PI * x[0]).sin())
}

/// `u = e^t (1 + x + sin(pi x))`: Dirichlet data `e^t` and `2 e^t`
pub fn heat_affine(elements: usize) -> Heat1d {
    Heat1d::new(elements)
        .unwrap()
        .with_source(|x, t| t.exp() * (1.0 + x[0] + (1.0 + PI * PI) * (PI * x[0]).sin()))
        .with_boundary_values(
            BoundaryExpression::new(|_, t| t.exp()).with_time_derivative(|_, t| t.exp()),
            BoundaryExpression::new(|_, t| 2.0 * t.exp())
                .with_time_derivative(|_, t| 2.0 * t.exp()),
        )
}

// =================================================================================================
// Counting Solver
// =================================================================================================

/// Built-in Krylov backend that counts the solves it performs
#[derive(Clone, Default)]
pub struct CountingSolver {
    solves: Arc<AtomicUsize>,
}

impl CountingSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solves(&self) -> usize {
        self.solves.load(Ordering::SeqCst)
    }
}

impl LinearSolver for CountingSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<DVector<f64>, StepperError> {
        self.solves.fetch_add(1, Ordering::SeqCst);
        KrylovSolver.solve(request)
    }

    fn name(&self) -> &str {
        "Counting Krylov"
    }
}
