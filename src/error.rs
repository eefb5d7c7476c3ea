//! Error taxonomy for time stepping
//!
//! Every fallible operation of the crate returns [`StepperError`]. Variants
//! fall into three groups:
//!
//! - **Contract violations**: misuse of the API (implicit tableau, malformed
//!   tableau, missing boundary derivative, dimension mismatch between the
//!   mass operator and what the provider returns). These are never retried.
//! - **Solver failures**: the linear solve did not converge within its
//!   iteration cap, or the Krylov method broke down.
//! - **Runtime data failures**: NaN/Inf states, invalid settings, errors
//!   reported by a concrete provider.
//!
//! No variant is ever swallowed: steppers propagate everything with `?`.

use thiserror::Error;

/// Errors raised by providers, steppers and the linear-algebra backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepperError {
    /// A Butcher tableau has a nonzero entry on or above the diagonal
    #[error("Butcher tableau is not explicit: A[{row}][{col}] = {value:e} lies on or above the diagonal")]
    ImplicitTableau { row: usize, col: usize, value: f64 },

    /// A Butcher tableau has inconsistent sizes or non-finite coefficients
    #[error("malformed Butcher tableau: {0}")]
    MalformedTableau(String),

    /// A boundary expression was asked for a time derivative it does not provide
    #[error("boundary expression provides no time derivative of order {order}")]
    MissingDerivative { order: usize },

    /// Operator, vector or constraint does not live in the mass operator's space
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Settings or time-step parameters outside their valid range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The iterative solver reached its iteration cap
    #[error(
        "{method} did not converge within {iterations} iterations \
         (relative residual {relative_residual:e}, tolerance {tolerance:e})"
    )]
    NotConverged {
        method: String,
        iterations: usize,
        relative_residual: f64,
        tolerance: f64,
    },

    /// The iterative solver or preconditioner cannot proceed
    #[error("{method} broke down: {reason}")]
    Breakdown { method: String, reason: String },

    /// NaN or Inf found in a state produced by a step
    #[error("{what} detected in state at step {step}; try reducing the time step")]
    NonFinite { what: &'static str, step: usize },

    /// Failure reported by a concrete problem provider
    #[error("problem provider failed: {0}")]
    Provider(String),
}

impl StepperError {
    /// Shorthand for a [`StepperError::DimensionMismatch`]
    pub fn dimension(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// True for errors that indicate misuse of the API rather than a runtime condition
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::ImplicitTableau { .. }
                | Self::MalformedTableau(_)
                | Self::MissingDerivative { .. }
                | Self::DimensionMismatch { .. }
        )
    }

    /// True when a linear solve failed (non-convergence or breakdown)
    pub fn is_solver_failure(&self) -> bool {
        matches!(self, Self::NotConverged { .. } | Self::Breakdown { .. })
    }
}
