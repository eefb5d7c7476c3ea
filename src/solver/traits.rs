//! Time-stepper interface and driving-loop types
//!
//! # Design
//!
//! - [`TimeStepper`]: one step `u0 -> u1` of a scheme; stateless between
//!   calls, so one stepper can drive any number of trajectories
//! - [`SolverConfiguration`]: how long and with how many steps to integrate
//! - [`SimulationResult`]: trajectory, final state and metadata produced by
//!   [`integrate`](crate::solver::integrate)

use std::collections::HashMap;

use nalgebra::DVector;

use crate::error::StepperError;
use crate::linalg::SolverSettings;

// =================================================================================================
// Time Stepper
// =================================================================================================

/// One step of a time-discretization scheme
///
/// # Contract
///
/// - `step` never mutates or aliases `u0`; the returned vector is new
/// - Dirichlet constraints are evaluated at the target time `t + dt`
/// - any solver failure or contract violation is returned, never swallowed
pub trait TimeStepper {
    /// Advance `u0` from `t` to `t + dt`
    fn step(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError>;

    /// Human-readable scheme name
    fn name(&self) -> &str;

    /// Order of accuracy in time
    fn order(&self) -> usize;

    /// Linear-solver settings the scheme is designed for
    fn default_settings(&self) -> SolverSettings;
}

impl<T: TimeStepper + ?Sized> TimeStepper for &T {
    fn step(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        (**self).step(u0, t, dt, settings)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn order(&self) -> usize {
        (**self).order()
    }

    fn default_settings(&self) -> SolverSettings {
        (**self).default_settings()
    }
}

impl<T: TimeStepper + ?Sized> TimeStepper for Box<T> {
    fn step(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        (**self).step(u0, t, dt, settings)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn order(&self) -> usize {
        (**self).order()
    }

    fn default_settings(&self) -> SolverSettings {
        (**self).default_settings()
    }
}

// =================================================================================================
// Solver Configuration
// =================================================================================================

/// Fixed-step time-evolution configuration
///
/// # Example
///
/// ```rust
/// use parabolic_rs::linalg::SolverSettings;
/// use parabolic_rs::solver::SolverConfiguration;
///
/// let config = SolverConfiguration::time_evolution(1.0, 100)
///     .starting_at(0.5)
///     .with_settings(SolverSettings::general().with_tolerance(1e-12));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.dt(), 0.01);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfiguration {
    /// Length of the integration interval
    pub total_time: f64,
    /// Number of steps
    pub time_steps: usize,
    /// Initial time
    pub start_time: f64,
    /// Linear-solver settings; the stepper's defaults when `None`
    pub settings: Option<SolverSettings>,
}

impl SolverConfiguration {
    /// Integrate over `[0, total_time]` in `time_steps` equal steps
    pub fn time_evolution(total_time: f64, time_steps: usize) -> Self {
        Self {
            total_time,
            time_steps,
            start_time: 0.0,
            settings: None,
        }
    }

    pub fn starting_at(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Step size `total_time / time_steps`
    pub fn dt(&self) -> f64 {
        self.total_time / self.time_steps as f64
    }

    /// Final time of the integration interval
    pub fn end_time(&self) -> f64 {
        self.start_time + self.total_time
    }

    pub fn validate(&self) -> Result<(), StepperError> {
        if !(self.total_time.is_finite() && self.total_time > 0.0) {
            return Err(StepperError::InvalidConfiguration(format!(
                "total time must be positive, got {}",
                self.total_time
            )));
        }
        if self.time_steps == 0 {
            return Err(StepperError::InvalidConfiguration(
                "time steps must be greater than 0".to_string(),
            ));
        }
        if !self.start_time.is_finite() {
            return Err(StepperError::InvalidConfiguration(
                "start time must be finite".to_string(),
            ));
        }
        if let Some(settings) = &self.settings {
            settings.validate()?;
        }
        Ok(())
    }
}

// =================================================================================================
// Simulation Result
// =================================================================================================

/// Trajectory produced by [`integrate`](crate::solver::integrate)
///
/// `time_points[i]` is the time of `state_trajectory[i]`; index 0 holds the
/// initial state.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    pub time_points: Vec<f64>,
    pub state_trajectory: Vec<DVector<f64>>,
    pub final_state: DVector<f64>,
    /// Free-form diagnostics (solver name, dt, ...)
    pub metadata: HashMap<String, String>,
}

impl SimulationResult {
    pub fn new(
        time_points: Vec<f64>,
        state_trajectory: Vec<DVector<f64>>,
        final_state: DVector<f64>,
    ) -> Self {
        Self {
            time_points,
            state_trajectory,
            final_state,
            metadata: HashMap::new(),
        }
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    /// Number of stored states, initial state included
    pub fn len(&self) -> usize {
        self.state_trajectory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_trajectory.is_empty()
    }

    /// Final time of the trajectory
    pub fn final_time(&self) -> Option<f64> {
        self.time_points.last().copied()
    }
}
