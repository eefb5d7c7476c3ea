//! Fixed-step driving loop

use nalgebra::DVector;

use crate::error::StepperError;
use crate::solver::{SimulationResult, SolverConfiguration, TimeStepper, validate_state};

/// Integrate `u0` over the configured interval with a fixed step
///
/// # Algorithm
///
/// 1. Validate the configuration and the initial state
/// 2. For each step `n = 0..N`:
///    - `u_{n+1} = stepper.step(u_n, t_n, dt)`
///    - reject NaN / Inf in `u_{n+1}`
///    - store `u_{n+1}` at `t_{n+1} = t0 + (n + 1) dt`
/// 3. Return the trajectory with metadata
///
/// Time points are computed from the step index, never accumulated, so the
/// last one is `t0 + total_time` up to one rounding.
///
/// # Example
///
/// ```rust
/// use nalgebra::DVector;
/// use parabolic_rs::models::Heat1d;
/// use parabolic_rs::solver::{ImplicitEuler, SolverConfiguration, integrate};
///
/// let heat = Heat1d::new(16).unwrap();
/// let u0 = heat.interpolate(|x| (std::f64::consts::PI * x[0]).sin());
/// let stepper = ImplicitEuler::from_problem(heat).unwrap();
///
/// let result = integrate(&stepper, &u0, &SolverConfiguration::time_evolution(0.1, 10)).unwrap();
///
/// assert_eq!(result.len(), 11);
/// assert!(result.final_state.max() < u0.max());
/// ```
pub fn integrate<S>(
    stepper: &S,
    u0: &DVector<f64>,
    config: &SolverConfiguration,
) -> Result<SimulationResult, StepperError>
where
    S: TimeStepper + ?Sized,
{
    // ====== Setup ======

    config.validate()?;
    validate_state(u0, 0)?;

    let settings = config
        .settings
        .clone()
        .unwrap_or_else(|| stepper.default_settings());
    let dt = config.dt();
    let t0 = config.start_time;

    let mut time_points = Vec::with_capacity(config.time_steps + 1);
    let mut state_trajectory = Vec::with_capacity(config.time_steps + 1);
    time_points.push(t0);
    state_trajectory.push(u0.clone());

    log::debug!(
        "{}: integrating {} steps of dt = {dt:.3e} from t = {t0}",
        stepper.name(),
        config.time_steps
    );

    // ====== Time Integration ======

    let mut state = u0.clone();
    for step in 0..config.time_steps {
        let t = t0 + step as f64 * dt;

        state = stepper.step(&state, t, dt, &settings)?;
        validate_state(&state, step + 1)?;

        state_trajectory.push(state.clone());
        time_points.push(t0 + (step as f64 + 1.0) * dt);
    }

    // ====== Result ======

    let mut result = SimulationResult::new(time_points, state_trajectory, state);
    result.add_metadata("solver", stepper.name());
    result.add_metadata("order", &stepper.order().to_string());
    result.add_metadata("time steps", &config.time_steps.to_string());
    result.add_metadata("dt", &dt.to_string());
    result.add_metadata("total time", &config.total_time.to_string());

    Ok(result)
}
