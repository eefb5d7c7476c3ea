//! Time-discretization schemes
//!
//! Concrete implementations of the [`TimeStepper`](crate::solver::TimeStepper) trait.
//!
//! # Available Methods
//!
//! | Scheme                 | Order | Solves per step | Default solver |
//! |------------------------|-------|-----------------|----------------|
//! | [`Dummy`]              | 0     | 0               | -              |
//! | [`ExplicitEuler`]      | 1     | 1 (mass)        | CG / Jacobi    |
//! | [`ImplicitEuler`]      | 1     | 1               | GMRES / ILU(0) |
//! | [`Trapezoidal`]        | 2     | 1               | GMRES / ILU(0) |
//! | [`RungeKutta`]         | tableau | s + 1 (mass)  | CG / Jacobi    |
//!
//! Explicit schemes only invert the mass operator; their time step is
//! bounded by the stiffness of `L`. Implicit schemes invert `M + theta dt L`
//! and are unconditionally stable.
//!
//! # Design
//!
//! Each scheme is:
//! - **Stateless between steps**: the same stepper can drive several
//!   trajectories
//! - **Built on [`StepperBase`](crate::solver::StepperBase)**: provider
//!   queries are checked in one place
//! - **Strict**: a failed solve is an error, never a silently degraded step

mod dummy;
pub mod euler;
pub mod runge_kutta;
mod trapezoidal;

pub use dummy::Dummy;
pub use euler::{ExplicitEuler, ImplicitEuler};
pub use runge_kutta::{ButcherTableau, HEUN_ALPHA, RungeKutta};
pub use trapezoidal::Trapezoidal;
