//! Explicit and implicit Euler
//!
//! # Mathematical Background
//!
//! For the semi-discrete system `M u' = b(t) - L(t) u`:
//!
//! ```text
//! explicit:  M u1              = M u0 + dt (b(t) - L(t) u0)
//! implicit:  (M + dt L(t+dt)) u1 = M u0 + dt b(t+dt)
//! ```
//!
//! Both are first order. The explicit scheme only ever inverts the mass
//! operator (symmetric positive definite, hence CG with Jacobi); the
//! implicit one inverts a general operator (GMRES with ILU(0)).
//!
//! Dirichlet constraints are always taken at `t + dt`.

use nalgebra::DVector;

use crate::error::StepperError;
use crate::linalg::{LinearSystem, SolverSettings, linear_combination, spmv};
use crate::problem::ParabolicProblem;
use crate::solver::{StepperBase, TimeStepper};

// =================================================================================================
// Explicit Euler
// =================================================================================================

/// Forward Euler: one mass solve per step
///
/// # Stability
///
/// Conditionally stable: `dt` must resolve the largest eigenvalue of
/// `M^-1 L`, which grows like `h^-2` under mesh refinement.
#[derive(Debug)]
pub struct ExplicitEuler<P> {
    base: StepperBase<P>,
}

impl<P: ParabolicProblem> ExplicitEuler<P> {
    pub fn new(base: StepperBase<P>) -> Self {
        Self { base }
    }

    pub fn from_problem(problem: P) -> Result<Self, StepperError> {
        Ok(Self::new(StepperBase::new(problem)?))
    }

    pub fn base(&self) -> &StepperBase<P> {
        &self.base
    }
}

impl<P: ParabolicProblem> TimeStepper for ExplicitEuler<P> {
    fn step(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        self.base.check_state(u0)?;
        let mass = self.base.mass();

        let current = self.base.linearization(t)?;
        let rhs = spmv(mass, u0) + dt * current.apply(u0);

        let bcs = self.base.constraints(t + dt)?;
        let system = LinearSystem::assemble(mass, rhs, &bcs)?;

        log::debug!("{}: t = {t:.6e}, dt = {dt:.3e}", self.name());
        self.base.solve(&system, None, Some(u0), settings)
    }

    fn name(&self) -> &str {
        "Explicit Euler"
    }

    fn order(&self) -> usize {
        1
    }

    fn default_settings(&self) -> SolverSettings {
        SolverSettings::symmetric()
    }
}

// =================================================================================================
// Implicit Euler
// =================================================================================================

/// Backward Euler: one solve with `M + dt L(t+dt)` per step
///
/// When the provider supplies `P(t+dt)`, the preconditioner is built from
/// `M + dt P(t+dt)` with the same constrained rows as the system.
#[derive(Debug)]
pub struct ImplicitEuler<P> {
    base: StepperBase<P>,
}

impl<P: ParabolicProblem> ImplicitEuler<P> {
    pub fn new(base: StepperBase<P>) -> Self {
        Self { base }
    }

    pub fn from_problem(problem: P) -> Result<Self, StepperError> {
        Ok(Self::new(StepperBase::new(problem)?))
    }

    pub fn base(&self) -> &StepperBase<P> {
        &self.base
    }
}

impl<P: ParabolicProblem> TimeStepper for ImplicitEuler<P> {
    fn step(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        self.base.check_state(u0)?;
        let mass = self.base.mass();
        let t1 = t + dt;

        let next = self.base.linearization(t1)?;
        let matrix = linear_combination(1.0, mass, dt, &next.operator)?;
        let rhs = spmv(mass, u0) + dt * &next.source;

        let bcs = self.base.constraints(t1)?;
        let system = LinearSystem::assemble(&matrix, rhs, &bcs)?;

        let preconditioner = match self.base.preconditioner(t1)? {
            Some(p) => {
                let operator = linear_combination(1.0, mass, dt, &p)?;
                Some(LinearSystem::constrain_operator(&operator, &bcs)?)
            }
            None => None,
        };

        log::debug!("{}: t = {t:.6e}, dt = {dt:.3e}", self.name());
        self.base
            .solve(&system, preconditioner.as_ref(), Some(u0), settings)
    }

    fn name(&self) -> &str {
        "Implicit Euler"
    }

    fn order(&self) -> usize {
        1
    }

    fn default_settings(&self) -> SolverSettings {
        SolverSettings::general()
    }
}
