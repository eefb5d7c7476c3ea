//! Provider contract for semi-discrete parabolic problems
//!
//! # Design
//!
//! The time steppers never discretize anything themselves. A provider
//! reduces `du/dt = F(u, t)` to
//!
//! ```text
//! M u' = b(t) - L(t) u
//! ```
//!
//! and hands out the three pieces on demand:
//!
//! - `M`: the constant mass operator, queried once per stepper
//! - `L(t)`, `b(t)`: the linearization, queried per time level, never cached
//! - the Dirichlet constraints at time `t`
//!
//! The required methods have no default: a provider that forgets one does
//! not compile. Optional methods default to "not provided" (preconditioner)
//! or to the generic formula (residual).

use std::sync::Arc;

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::error::StepperError;
use crate::linalg::spmv;
use crate::problem::boundary::DirichletBc;

/// Linearization `(L(t), b(t))` of the spatial operator at one time level
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    /// Spatial operator `L(t)`
    pub operator: CsrMatrix<f64>,
    /// Source term `b(t)`
    pub source: DVector<f64>,
}

impl Linearization {
    pub fn new(operator: CsrMatrix<f64>, source: DVector<f64>) -> Self {
        Self { operator, source }
    }

    /// `b - L u`
    pub fn apply(&self, u: &DVector<f64>) -> DVector<f64> {
        &self.source - spmv(&self.operator, u)
    }
}

/// Spatial discretization of a parabolic PDE
///
/// # Example
///
/// ```rust
/// use nalgebra::DVector;
/// use nalgebra_sparse::CsrMatrix;
/// use parabolic_rs::error::StepperError;
/// use parabolic_rs::problem::{DirichletBc, Linearization, ParabolicProblem};
///
/// /// u' = -u on a single dof
/// struct Decay;
///
/// impl ParabolicProblem for Decay {
///     fn mass(&self) -> CsrMatrix<f64> {
///         CsrMatrix::identity(1)
///     }
///
///     fn get_system(&self, _t: f64) -> Result<Linearization, StepperError> {
///         Ok(Linearization::new(CsrMatrix::identity(1), DVector::zeros(1)))
///     }
///
///     fn get_bcs(&self, _t: f64) -> Result<Vec<DirichletBc>, StepperError> {
///         Ok(Vec::new())
///     }
/// }
///
/// let r = Decay.residual(0.0, &DVector::from_element(1, 2.0)).unwrap();
/// assert_eq!(r[0], -2.0);
/// ```
pub trait ParabolicProblem {
    /// Mass operator `M`, constant in time
    fn mass(&self) -> CsrMatrix<f64>;

    /// Linearization `(L(t), b(t))`
    fn get_system(&self, t: f64) -> Result<Linearization, StepperError>;

    /// Dirichlet constraints evaluated at `t`, applied in order (last wins)
    fn get_bcs(&self, t: f64) -> Result<Vec<DirichletBc>, StepperError>;

    /// Preconditioning operator `P(t)` approximating `L(t)`
    ///
    /// `None` lets each scheme precondition with its own system operator.
    fn get_preconditioner(&self, _t: f64) -> Result<Option<CsrMatrix<f64>>, StepperError> {
        Ok(None)
    }

    /// Residual `b(t) - L(t) u`
    fn residual(&self, t: f64, u: &DVector<f64>) -> Result<DVector<f64>, StepperError> {
        let system = self.get_system(t)?;
        if system.operator.ncols() != u.len() {
            return Err(StepperError::dimension(
                "state length",
                system.operator.ncols(),
                u.len(),
            ));
        }
        if system.source.len() != system.operator.nrows() {
            return Err(StepperError::dimension(
                "source vector",
                system.operator.nrows(),
                system.source.len(),
            ));
        }
        Ok(system.apply(u))
    }
}

// =================================================================================================
// Blanket Implementations
// =================================================================================================

macro_rules! forward_problem {
    ($($wrapper:ty),*) => {
        $(
            impl<T: ParabolicProblem + ?Sized> ParabolicProblem for $wrapper {
                fn mass(&self) -> CsrMatrix<f64> {
                    (**self).mass()
                }

                fn get_system(&self, t: f64) -> Result<Linearization, StepperError> {
                    (**self).get_system(t)
                }

                fn get_bcs(&self, t: f64) -> Result<Vec<DirichletBc>, StepperError> {
                    (**self).get_bcs(t)
                }

                fn get_preconditioner(
                    &self,
                    t: f64,
                ) -> Result<Option<CsrMatrix<f64>>, StepperError> {
                    (**self).get_preconditioner(t)
                }

                fn residual(&self, t: f64, u: &DVector<f64>) -> Result<DVector<f64>, StepperError> {
                    (**self).residual(t, u)
                }
            }
        )*
    };
}

forward_problem!(&T, Box<T>, Arc<T>);
