//! Time steppers
//!
//! This module advances the semi-discrete system
//!
//! ```text
//! M du/dt + L(t) u = b(t),    u = g(t) on the Dirichlet dofs
//! ```
//!
//! by one step `u(t) -> u(t + dt)` with a choice of schemes, and drives
//! fixed-step trajectories with [`integrate`].
//!
//! # Core Concepts
//!
//! ## The Architecture (WHAT vs HOW)
//!
//! 1. **Problem** ([`ParabolicProblem`](crate::problem::ParabolicProblem)) - WHAT to solve
//!    - Mass operator, linearization, constraints
//!    - Queried at the times a scheme needs them
//!
//! 2. **Scheme** ([`TimeStepper`]) - HOW one step is taken
//!    - Builds one or more constrained linear systems per step
//!    - Hands them to a [`LinearSolver`](crate::linalg::LinearSolver)
//!
//! 3. **Configuration** ([`SolverConfiguration`]) - how many steps, from when
//!    - Total time, step count, start time
//!    - Optional solver settings overriding the scheme defaults
//!
//! # Module Organization
//!
//! - **`traits`**: [`TimeStepper`], [`SolverConfiguration`], [`SimulationResult`]
//! - **`base`**: [`StepperBase`], the checked provider boundary
//! - **`integrate`**: the fixed-step driving loop
//! - **`methods`**: the concrete schemes
//!
//! # Quick Start Example
//!
//! ```rust
//! use parabolic_rs::models::Heat1d;
//! use parabolic_rs::solver::{SolverConfiguration, Trapezoidal, integrate};
//!
//! let heat = Heat1d::new(32).unwrap();
//! let u0 = heat.interpolate(|x| (std::f64::consts::PI * x[0]).sin());
//!
//! let stepper = Trapezoidal::from_problem(heat).unwrap();
//! let config = SolverConfiguration::time_evolution(0.05, 20);
//!
//! let result = integrate(&stepper, &u0, &config).unwrap();
//! assert_eq!(result.metadata["solver"], "Trapezoidal");
//! ```
//!
//! # Choosing a Scheme
//!
//! - **Non-stiff or short horizons**: [`RungeKutta`] with a classical tableau
//!   - Only the mass operator is inverted
//!   - `dt` bounded by the spectrum of `M^-1 L`
//!
//! - **Stiff problems**: [`ImplicitEuler`] or [`Trapezoidal`]
//!   - One nonsymmetric solve per step
//!   - Unconditionally stable
//!
//! # Error Handling
//!
//! Every operation returns `Result<T, StepperError>`. A failed linear solve
//! aborts the step; [`integrate`] additionally rejects NaN/Inf states:
//!
//! ```rust
//! use nalgebra::DVector;
//! use parabolic_rs::error::StepperError;
//! use parabolic_rs::models::Heat1d;
//! use parabolic_rs::solver::{ExplicitEuler, SolverConfiguration, integrate};
//!
//! // far beyond the explicit stability limit
//! let heat = Heat1d::new(64).unwrap();
//! let u0 = heat.interpolate(|x| x[0] * (1.0 - x[0]));
//! let stepper = ExplicitEuler::from_problem(heat).unwrap();
//!
//! match integrate(&stepper, &u0, &SolverConfiguration::time_evolution(100.0, 200)) {
//!     Ok(result) => assert!(result.final_state.iter().all(|x| x.is_finite())),
//!     Err(StepperError::NonFinite { step, .. }) => assert!(step > 0),
//!     Err(other) => assert!(other.is_solver_failure()),
//! }
//! ```

// =================================================================================================
// Module Declarations
// =================================================================================================

mod traits;
pub(crate) mod base;
mod integrate;
pub mod methods;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use traits::{SimulationResult, SolverConfiguration, TimeStepper};

pub use base::StepperBase;
pub use integrate::integrate;

pub use methods::{
    ButcherTableau, Dummy, ExplicitEuler, HEUN_ALPHA, ImplicitEuler, RungeKutta, Trapezoidal,
};

// =================================================================================================
// Helper Functions
// =================================================================================================

use nalgebra::DVector;

use crate::error::StepperError;

/// Reject states holding NaN or Inf
///
/// NaN is reported before Inf when both are present.
///
/// # Arguments
///
/// * `state` - State produced by a step
/// * `step` - Index of that step (0 for the initial state)
pub(crate) fn validate_state(state: &DVector<f64>, step: usize) -> Result<(), StepperError> {
    if state.iter().any(|x| x.is_nan()) {
        return Err(StepperError::NonFinite { what: "NaN", step });
    }
    if state.iter().any(|x| x.is_infinite()) {
        return Err(StepperError::NonFinite {
            what: "Infinity",
            step,
        });
    }
    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_state_is_valid() {
        assert!(validate_state(&DVector::from_vec(vec![0.0, -1.0, 1e300]), 3).is_ok());
    }

    #[test]
    fn test_nan_is_reported_before_infinity() {
        let state = DVector::from_vec(vec![f64::INFINITY, f64::NAN]);
        assert_eq!(
            validate_state(&state, 7),
            Err(StepperError::NonFinite { what: "NaN", step: 7 })
        );
    }

    #[test]
    fn test_infinity_is_reported() {
        let state = DVector::from_vec(vec![1.0, f64::NEG_INFINITY]);
        assert_eq!(
            validate_state(&state, 1),
            Err(StepperError::NonFinite {
                what: "Infinity",
                step: 1
            })
        );
    }
}
