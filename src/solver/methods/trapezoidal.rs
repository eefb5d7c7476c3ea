//! Trapezoidal rule (Crank-Nicolson)
//!
//! # Mathematical Background
//!
//! ```text
//! (M + dt/2 L(t+dt)) u1 = M u0 + dt/2 (b(t) + b(t+dt)) - dt/2 L(t) u0
//! ```
//!
//! Second order and A-stable, but not L-stable: very stiff modes are
//! damped with a factor close to -1 instead of vanishing.

use nalgebra::DVector;

use crate::error::StepperError;
use crate::linalg::{LinearSystem, SolverSettings, linear_combination, spmv};
use crate::problem::ParabolicProblem;
use crate::solver::{StepperBase, TimeStepper};

/// Crank-Nicolson: one solve with `M + dt/2 L(t+dt)` per step
///
/// A provider preconditioner `P(t+dt)` is used as `M + dt/2 P(t+dt)`.
#[derive(Debug)]
pub struct Trapezoidal<P> {
    base: StepperBase<P>,
}

impl<P: ParabolicProblem> Trapezoidal<P> {
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

impl<P: ParabolicProblem> TimeStepper for Trapezoidal<P> {
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
        let half = 0.5 * dt;

        let current = self.base.linearization(t)?;
        let next = self.base.linearization(t1)?;

        let matrix = linear_combination(1.0, mass, half, &next.operator)?;
        // b(t) - L(t) u0 + b(t+dt)
        let rhs = spmv(mass, u0) + half * (current.apply(u0) + &next.source);

        let bcs = self.base.constraints(t1)?;
        let system = LinearSystem::assemble(&matrix, rhs, &bcs)?;

        let preconditioner = match self.base.preconditioner(t1)? {
            Some(p) => {
                let operator = linear_combination(1.0, mass, half, &p)?;
                Some(LinearSystem::constrain_operator(&operator, &bcs)?)
            }
            None => None,
        };

        log::debug!("{}: t = {t:.6e}, dt = {dt:.3e}", self.name());
        self.base
            .solve(&system, preconditioner.as_ref(), Some(u0), settings)
    }

    fn name(&self) -> &str {
        "Trapezoidal"
    }

    fn order(&self) -> usize {
        2
    }

    fn default_settings(&self) -> SolverSettings {
        SolverSettings::general()
    }
}
