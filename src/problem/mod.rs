//! Problem definition: what the time steppers integrate
//!
//! - **`traits`**: the [`ParabolicProblem`] provider contract and its
//!   [`Linearization`]
//! - **`boundary`**: evaluated and time-parameterized Dirichlet data
//!
//! Concrete providers live in [`crate::models`].

mod boundary;
mod traits;

pub use boundary::{
    BoundaryConditionDeriver, BoundaryExpression, BoundaryRegion, DirichletBc,
    SymbolicDirichletBc, TimeField,
};
pub use traits::{Linearization, ParabolicProblem};
