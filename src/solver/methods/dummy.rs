//! Identity stepper
//!
//! Returns a copy of the incoming state. Useful as a baseline in
//! convergence studies (order 0) and to test driving loops without any
//! linear algebra.

use nalgebra::DVector;

use crate::error::StepperError;
use crate::linalg::SolverSettings;
use crate::solver::TimeStepper;

/// `u1 = u0`; queries nothing and performs no solve
#[derive(Debug, Clone, Copy, Default)]
pub struct Dummy;

impl Dummy {
    pub fn new() -> Self {
        Self
    }
}

impl TimeStepper for Dummy {
    fn step(
        &self,
        u0: &DVector<f64>,
        _t: f64,
        _dt: f64,
        _settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        Ok(u0.clone())
    }

    fn name(&self) -> &str {
        "Dummy"
    }

    fn order(&self) -> usize {
        0
    }

    fn default_settings(&self) -> SolverSettings {
        SolverSettings::symmetric()
    }
}
