//! Reference problem providers
//!
//! All models implement the [`ParabolicProblem`](crate::problem::ParabolicProblem)
//! trait. Models own the spatial discretization; the steppers only see the
//! assembled operators.
//!
//! # Available Models
//!
//! ## [`Heat1d`]: P1 heat equation on the unit interval
//!
//! Constant mass and stiffness operators, time-dependent source and
//! Dirichlet data. Used by the tests, the benchmarks and the documentation
//! examples; with a manufactured source it gives the exact solution needed
//! to measure temporal orders of accuracy.

// =================================================================================================
// Module Declarations
// =================================================================================================

pub mod heat;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use heat::Heat1d;
