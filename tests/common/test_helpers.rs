//! Helper functions for integration tests

use nalgebra::DVector;

use parabolic_rs::linalg::SolverSettings;
use parabolic_rs::solver::{SolverConfiguration, TimeStepper, integrate};

/// Scheme defaults with a solver tolerance far below the discretization error
pub fn tight<S: TimeStepper + ?Sized>(stepper: &S) -> SolverSettings {
    stepper.default_settings().with_tolerance(1e-13)
}

/// Final state after `steps` steps over `[0, total_time]` with tight settings
pub fn run<S: TimeStepper + ?Sized>(
    stepper: &S,
    u0: &DVector<f64>,
    total_time: f64,
    steps: usize,
) -> DVector<f64> {
    let config = SolverConfiguration::time_evolution(total_time, steps).with_settings(tight(stepper));
    integrate(stepper, u0, &config)
        .unwrap_or_else(|e| panic!("{} failed with {steps} steps: {e}", stepper.name()))
        .final_state
}

/// Observed orders `log2(e_k / e_{k+1})` for errors at successively halved steps
pub fn orders_from_errors(errors: &[f64]) -> Vec<f64> {
    errors.windows(2).map(|e| (e[0] / e[1]).log2()).collect()
}

/// Observed orders from solutions at successively halved steps
///
/// Uses the differences of consecutive solutions so that the spatial error,
/// identical for every step size, cancels out.
pub fn temporal_orders(solutions: &[DVector<f64>]) -> Vec<f64> {
    let differences: Vec<f64> = solutions
        .windows(2)
        .map(|s| (&s[0] - &s[1]).amax())
        .collect();
    orders_from_errors(&differences)
}
