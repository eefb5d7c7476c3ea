//! Explicit Runge-Kutta methods driven by a Butcher tableau
//!
//! # Mathematical Background
//!
//! For `M u' = F(t, u)` with `F(t, u) = b(t) - L(t) u` and a tableau
//! `(A, b, c)` with `s` stages:
//!
//! ```text
//! U_i   = u0 + dt * sum_{j<i} A[i][j] k_j
//! M k_i = F(t + c_i dt, U_i)                     i = 0..s
//! U     = u0 + dt * sum_i b_i k_i
//! M u1  = M U
//! ```
//!
//! Every line with `M` on the left is a mass solve, so one step costs
//! exactly `s + 1` sequential solves.
//!
//! # Boundary Conditions
//!
//! Stage values `k_i` approximate `u'`, so each stage solve prescribes the
//! first time derivative of the boundary data at `t + c_i dt`. The final
//! projection prescribes the boundary data itself at `t + dt`. This is a
//! heuristic (see D. Pathria, *Intermediate Boundary Conditions for
//! Runge-Kutta Time Integration of Initial-Boundary Value Problems*, 1995,
//! for exact intermediate conditions).
//!
//! # Tableaux
//!
//! | Constructor                     | Stages | Order |
//! |---------------------------------|--------|-------|
//! | [`ButcherTableau::heun`]        | 2      | 2     |
//! | [`ButcherTableau::rk4`]         | 4      | 4     |
//! | [`ButcherTableau::rkf45`]       | 6      | 5 (embedded 4) |
//!
//! # Example
//!
//! ```rust
//! use nalgebra::DVector;
//! use parabolic_rs::models::Heat1d;
//! use parabolic_rs::solver::{RungeKutta, StepperBase, TimeStepper};
//!
//! let heat = Heat1d::new(8).unwrap();
//! let bcs = heat.boundary_conditions();
//! let rk4 = RungeKutta::rk4(StepperBase::new(heat).unwrap(), &bcs).unwrap();
//!
//! let u0 = DVector::zeros(9);
//! let u1 = rk4.step(&u0, 0.0, 1e-3, &rk4.default_settings()).unwrap();
//! assert_eq!(u1.len(), 9);
//! ```

use nalgebra::{DMatrix, DVector};

use crate::error::StepperError;
use crate::linalg::{LinearSystem, SolverSettings, spmv};
use crate::problem::{BoundaryConditionDeriver, ParabolicProblem, SymbolicDirichletBc};
use crate::solver::base::check_dofs;
use crate::solver::{StepperBase, TimeStepper};

/// Entries on or above the diagonal of `A` must stay below this magnitude.
const EXPLICIT_TOLERANCE: f64 = 1e-15;

/// Default Heun parameter
pub const HEUN_ALPHA: f64 = 2.0 / 3.0;

// =================================================================================================
// Butcher Tableau
// =================================================================================================

/// Validated explicit Butcher tableau
///
/// Immutable after construction; [`ButcherTableau::new`] rejects any
/// tableau with a nonzero entry on or above the diagonal of `A`.
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau {
    name: String,
    order: usize,
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: DVector<f64>,
    embedded: Option<DVector<f64>>,
}

impl ButcherTableau {
    /// Build and validate a tableau
    ///
    /// # Errors
    ///
    /// - [`StepperError::MalformedTableau`] for empty or inconsistent sizes
    ///   and non-finite coefficients
    /// - [`StepperError::ImplicitTableau`] for `|A[i][j]| >= 1e-15`, `j >= i`
    ///
    /// # Example
    ///
    /// ```rust
    /// use nalgebra::{DMatrix, DVector};
    /// use parabolic_rs::solver::ButcherTableau;
    ///
    /// // Midpoint rule
    /// let midpoint = ButcherTableau::new(
    ///     "Midpoint",
    ///     2,
    ///     DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.5, 0.0]),
    ///     DVector::from_vec(vec![0.0, 1.0]),
    ///     DVector::from_vec(vec![0.0, 0.5]),
    /// )
    /// .unwrap();
    /// assert_eq!(midpoint.stages(), 2);
    ///
    /// // Implicit midpoint is rejected
    /// let implicit = ButcherTableau::new(
    ///     "Implicit midpoint",
    ///     2,
    ///     DMatrix::from_element(1, 1, 0.5),
    ///     DVector::from_element(1, 1.0),
    ///     DVector::from_element(1, 0.5),
    /// );
    /// assert!(implicit.is_err());
    /// ```
    pub fn new(
        name: impl Into<String>,
        order: usize,
        a: DMatrix<f64>,
        b: DVector<f64>,
        c: DVector<f64>,
    ) -> Result<Self, StepperError> {
        let s = b.len();
        if s == 0 {
            return Err(StepperError::MalformedTableau(
                "a tableau needs at least one stage".to_string(),
            ));
        }
        if a.nrows() != s || a.ncols() != s {
            return Err(StepperError::MalformedTableau(format!(
                "A is {}x{} but b has {s} stages",
                a.nrows(),
                a.ncols()
            )));
        }
        if c.len() != s {
            return Err(StepperError::MalformedTableau(format!(
                "c has {} entries but b has {s} stages",
                c.len()
            )));
        }
        if a.iter().chain(b.iter()).chain(c.iter()).any(|x| !x.is_finite()) {
            return Err(StepperError::MalformedTableau(
                "coefficients must be finite".to_string(),
            ));
        }

        for row in 0..s {
            for col in row..s {
                let value = a[(row, col)];
                if value.abs() >= EXPLICIT_TOLERANCE {
                    return Err(StepperError::ImplicitTableau { row, col, value });
                }
            }
        }

        Ok(Self {
            name: name.into(),
            order,
            a,
            b,
            c,
            embedded: None,
        })
    }

    /// Attach a lower-order weight vector for error estimation
    pub fn with_embedded(mut self, weights: DVector<f64>) -> Result<Self, StepperError> {
        if weights.len() != self.stages() {
            return Err(StepperError::MalformedTableau(format!(
                "embedded weights have {} entries but the tableau has {} stages",
                weights.len(),
                self.stages()
            )));
        }
        if weights.iter().any(|x| !x.is_finite()) {
            return Err(StepperError::MalformedTableau(
                "embedded weights must be finite".to_string(),
            ));
        }
        self.embedded = Some(weights);
        Ok(self)
    }

    /// Heun's family: `c = [0, alpha]`, `b = [1 - 1/(2 alpha), 1/(2 alpha)]`
    ///
    /// `alpha = 1/2` is the midpoint rule, `alpha = 1` the trapezoidal Heun
    /// method, `alpha = 2/3` ([`HEUN_ALPHA`]) Ralston's method.
    pub fn heun(alpha: f64) -> Result<Self, StepperError> {
        if !alpha.is_finite() || alpha == 0.0 {
            return Err(StepperError::MalformedTableau(format!(
                "Heun parameter must be finite and nonzero, got {alpha}"
            )));
        }
        let weight = 1.0 / (2.0 * alpha);
        Self::new(
            "Heun",
            2,
            DMatrix::from_row_slice(2, 2, &[0.0, 0.0, alpha, 0.0]),
            DVector::from_vec(vec![1.0 - weight, weight]),
            DVector::from_vec(vec![0.0, alpha]),
        )
    }

    /// Classical fourth-order Runge-Kutta
    pub fn rk4() -> Self {
        Self {
            name: "Runge-Kutta 4".to_string(),
            order: 4,
            a: DMatrix::from_row_slice(
                4,
                4,
                &[
                    0.0, 0.0, 0.0, 0.0, //
                    0.5, 0.0, 0.0, 0.0, //
                    0.0, 0.5, 0.0, 0.0, //
                    0.0, 0.0, 1.0, 0.0,
                ],
            ),
            b: DVector::from_vec(vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0]),
            c: DVector::from_vec(vec![0.0, 0.5, 0.5, 1.0]),
            embedded: None,
        }
    }

    /// Runge-Kutta-Fehlberg: fifth-order weights propagate the solution,
    /// fourth-order weights are kept as the embedded set
    pub fn rkf45() -> Self {
        Self {
            name: "Runge-Kutta-Fehlberg".to_string(),
            order: 5,
            a: DMatrix::from_row_slice(
                6,
                6,
                &[
                    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
                    0.25, 0.0, 0.0, 0.0, 0.0, 0.0, //
                    3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0, 0.0, //
                    1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0, 0.0, //
                    439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0, 0.0, //
                    -8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0, 0.0,
                ],
            ),
            b: DVector::from_vec(vec![
                16.0 / 135.0,
                0.0,
                6656.0 / 12825.0,
                28561.0 / 56430.0,
                -9.0 / 50.0,
                2.0 / 55.0,
            ]),
            c: DVector::from_vec(vec![0.0, 0.25, 3.0 / 8.0, 12.0 / 13.0, 1.0, 0.5]),
            embedded: Some(DVector::from_vec(vec![
                25.0 / 216.0,
                0.0,
                1408.0 / 2565.0,
                2197.0 / 4104.0,
                -1.0 / 5.0,
                0.0,
            ])),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of stages `s`
    pub fn stages(&self) -> usize {
        self.b.len()
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn c(&self) -> &DVector<f64> {
        &self.c
    }

    pub fn embedded(&self) -> Option<&DVector<f64>> {
        self.embedded.as_ref()
    }
}

// =================================================================================================
// Runge-Kutta Driver
// =================================================================================================

/// Generic explicit Runge-Kutta stepper
///
/// The boundary data is given symbolically so that its first time
/// derivative is available for the stage solves; both derivative sets are
/// built once at construction.
///
/// Only the symbolic conditions passed to the constructor are applied. The
/// provider's [`get_bcs`](ParabolicProblem::get_bcs) is never used while
/// stepping, so a provider with Dirichlet data needs the matching symbolic
/// set here.
#[derive(Debug)]
pub struct RungeKutta<P> {
    base: StepperBase<P>,
    tableau: ButcherTableau,
    boundary: BoundaryConditionDeriver,
}

impl<P: ParabolicProblem> RungeKutta<P> {
    /// Fails with [`StepperError::MissingDerivative`] when a boundary
    /// expression has no first time derivative
    pub fn new(
        base: StepperBase<P>,
        tableau: ButcherTableau,
        bcs: &[SymbolicDirichletBc],
    ) -> Result<Self, StepperError> {
        for bc in bcs {
            check_dofs(bc.region().dofs(), base.dofs())?;
        }
        let boundary = BoundaryConditionDeriver::new(bcs, 1)?;

        if bcs.is_empty()
            && let Ok(provided) = base.problem().get_bcs(0.0)
            && !provided.is_empty()
        {
            log::warn!(
                "{}: provider has {} Dirichlet condition(s) but no symbolic boundary data was given; \
                 stepping unconstrained",
                tableau.name(),
                provided.len()
            );
        }

        Ok(Self {
            base,
            tableau,
            boundary,
        })
    }

    /// Heun with [`HEUN_ALPHA`]
    pub fn heun(base: StepperBase<P>, bcs: &[SymbolicDirichletBc]) -> Result<Self, StepperError> {
        Self::new(base, ButcherTableau::heun(HEUN_ALPHA)?, bcs)
    }

    pub fn rk4(base: StepperBase<P>, bcs: &[SymbolicDirichletBc]) -> Result<Self, StepperError> {
        Self::new(base, ButcherTableau::rk4(), bcs)
    }

    pub fn rkf45(base: StepperBase<P>, bcs: &[SymbolicDirichletBc]) -> Result<Self, StepperError> {
        Self::new(base, ButcherTableau::rkf45(), bcs)
    }

    pub fn base(&self) -> &StepperBase<P> {
        &self.base
    }

    pub fn tableau(&self) -> &ButcherTableau {
        &self.tableau
    }

    /// Advance one step and estimate the local error with the embedded weights
    ///
    /// The estimate is `|| dt sum_i (b_i - b*_i) k_i ||_2`, `None` for
    /// tableaux without an embedded set.
    pub fn step_with_estimate(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<(DVector<f64>, Option<f64>), StepperError> {
        self.base.check_state(u0)?;
        log::debug!("{}: t = {t:.6e}, dt = {dt:.3e}", self.tableau.name());

        let k = self.stage_values(u0, t, dt, settings)?;
        let u1 = self.combine(u0, &k, t, dt, settings)?;

        let estimate = self.tableau.embedded().map(|embedded| {
            let mut difference = DVector::zeros(u0.len());
            for (i, k_i) in k.iter().enumerate() {
                difference.axpy(dt * (self.tableau.b[i] - embedded[i]), k_i, 1.0);
            }
            difference.norm()
        });

        Ok((u1, estimate))
    }

    /// `M k_i = F(t + c_i dt, U_i)` with first-derivative boundary data
    fn stage_values(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<Vec<DVector<f64>>, StepperError> {
        let mass = self.base.mass();
        let a = &self.tableau.a;
        let mut k: Vec<DVector<f64>> = Vec::with_capacity(self.tableau.stages());

        for i in 0..self.tableau.stages() {
            let mut stage = u0.clone();
            for (j, k_j) in k.iter().enumerate() {
                if a[(i, j)] != 0.0 {
                    stage.axpy(dt * a[(i, j)], k_j, 1.0);
                }
            }

            let t_i = t + self.tableau.c[i] * dt;
            let rhs = self.base.residual(t_i, &stage)?;
            let bcs = self.boundary.conditions(1, t_i)?;
            let system = LinearSystem::assemble(mass, rhs, &bcs)?;

            k.push(self.base.solve(&system, None, None, settings)?);
        }

        Ok(k)
    }

    /// `M u1 = M (u0 + dt sum_i b_i k_i)` with boundary data at `t + dt`
    fn combine(
        &self,
        u0: &DVector<f64>,
        k: &[DVector<f64>],
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        let mass = self.base.mass();

        let mut combined = u0.clone();
        for (b_i, k_i) in self.tableau.b.iter().zip(k) {
            combined.axpy(dt * b_i, k_i, 1.0);
        }

        let bcs = self.boundary.conditions(0, t + dt)?;
        let system = LinearSystem::assemble(mass, spmv(mass, &combined), &bcs)?;

        self.base.solve(&system, None, Some(&combined), settings)
    }
}

impl<P: ParabolicProblem> TimeStepper for RungeKutta<P> {
    fn step(
        &self,
        u0: &DVector<f64>,
        t: f64,
        dt: f64,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        self.step_with_estimate(u0, t, dt, settings)
            .map(|(u1, _)| u1)
    }

    fn name(&self) -> &str {
        self.tableau.name()
    }

    fn order(&self) -> usize {
        self.tableau.order()
    }

    fn default_settings(&self) -> SolverSettings {
        SolverSettings::symmetric()
    }
}
