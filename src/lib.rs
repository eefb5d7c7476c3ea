//! parabolic-rs: time stepping for semi-discrete parabolic PDEs
//!
//! A spatial discretization reduces `du/dt = F(u, t)` to
//!
//! ```text
//! M u' = b(t) - L(t) u,    u = g(t) on the Dirichlet dofs
//! ```
//!
//! and this crate advances that system in time.
//!
//! # Architecture
//!
//! parabolic-rs is built on two core principles:
//!
//! 1. **Separation of Discretization and Time Stepping**
//!    - Providers define the operators (what to solve)
//!    - Time steppers provide the schemes (how to advance it)
//!
//! 2. **Strict Contracts**
//!    - Every provider answer is dimension-checked before use
//!    - Every failure is a typed [`StepperError`](error::StepperError)
//!
//! # Quick Start
//!
//! ```rust
//! use parabolic_rs::prelude::*;
//!
//! # fn main() -> Result<(), StepperError> {
//! // 1. Provider: heat equation with u = e^t sin(pi x) as exact solution
//! let pi = std::f64::consts::PI;
//! let heat = Heat1d::new(32)?
//!     .with_source(move |x, t| (1.0 + pi * pi) * t.exp() * (pi * x[0]).sin());
//! let u0 = heat.interpolate(|x| (pi * x[0]).sin());
//!
//! // 2. Scheme
//! let stepper = Trapezoidal::from_problem(heat)?;
//!
//! // 3. Run
//! let config = SolverConfiguration::time_evolution(0.5, 50);
//! let result = integrate(&stepper, &u0, &config)?;
//!
//! // 4. Access results
//! let expected = 0.5f64.exp();
//! assert!((result.final_state[16] - expected).abs() < 1e-2);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`problem`]: provider contract and Dirichlet data
//! - [`linalg`]: sparse operators, constrained systems, Krylov backend
//! - [`solver`]: time steppers and the driving loop
//! - [`models`]: reference providers
//! - [`error`]: the error type
//!
//! # Features
//!
//! - `parallel`: sparse matrix-vector products over rayon above
//!   [`linalg::parallel_threshold`] rows

// Core modules
pub mod error;
pub mod problem;

pub mod linalg;
pub mod models;
pub mod solver;

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use parabolic_rs::prelude::*;
    //! ```
    pub use crate::error::StepperError;
    pub use crate::linalg::{KrylovMethod, LinearSolver, PreconditionerKind, SolverSettings};
    pub use crate::models::Heat1d;
    pub use crate::problem::{
        BoundaryExpression, BoundaryRegion, DirichletBc, Linearization, ParabolicProblem,
        SymbolicDirichletBc,
    };
    pub use crate::solver::{
        ButcherTableau, Dummy, ExplicitEuler, ImplicitEuler, RungeKutta, SimulationResult,
        SolverConfiguration, StepperBase, TimeStepper, Trapezoidal, integrate,
    };
}
