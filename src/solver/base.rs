//! Shared state and provider-boundary checks of every stepper
//!
//! [`StepperBase`] owns the provider, the constant mass operator and the
//! linear-solver backend. Everything a scheme receives from the provider
//! goes through it and is checked against the mass operator's size `n`
//! before any system is assembled.

use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::error::StepperError;
use crate::linalg::{KrylovSolver, LinearSolver, LinearSystem, SolveRequest, SolverSettings};
use crate::problem::{DirichletBc, Linearization, ParabolicProblem};

/// Provider, mass operator and solver backend shared by the schemes
///
/// The mass operator is built once and shared read-only: clone the
/// [`Arc`] from [`shared_mass`](Self::shared_mass) to reuse it in another
/// stepper over the same discretization.
pub struct StepperBase<P> {
    problem: P,
    mass: Arc<CsrMatrix<f64>>,
    solver: Arc<dyn LinearSolver>,
}

impl<P: ParabolicProblem> StepperBase<P> {
    /// Query the mass operator once and use the built-in Krylov backend
    pub fn new(problem: P) -> Result<Self, StepperError> {
        let mass = Arc::new(problem.mass());
        Self::with_mass(problem, mass)
    }

    /// Reuse an already built mass operator
    pub fn with_mass(problem: P, mass: Arc<CsrMatrix<f64>>) -> Result<Self, StepperError> {
        if mass.nrows() != mass.ncols() {
            return Err(StepperError::dimension(
                "mass operator columns",
                mass.nrows(),
                mass.ncols(),
            ));
        }
        Ok(Self {
            problem,
            mass,
            solver: Arc::new(KrylovSolver),
        })
    }

    /// Replace the linear-solver backend
    pub fn with_solver(mut self, solver: Arc<dyn LinearSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn mass(&self) -> &CsrMatrix<f64> {
        &self.mass
    }

    pub fn shared_mass(&self) -> Arc<CsrMatrix<f64>> {
        Arc::clone(&self.mass)
    }

    pub fn solver(&self) -> &dyn LinearSolver {
        self.solver.as_ref()
    }

    /// Number of degrees of freedom
    pub fn dofs(&self) -> usize {
        self.mass.nrows()
    }

    // =============================================================================================
    // Checked Provider Queries
    // =============================================================================================

    /// `(L(t), b(t))` with `L` n x n and `b` of length n
    pub fn linearization(&self, t: f64) -> Result<Linearization, StepperError> {
        let n = self.dofs();
        let system = self.problem.get_system(t)?;
        if system.operator.nrows() != n {
            return Err(StepperError::dimension(
                "system operator rows",
                n,
                system.operator.nrows(),
            ));
        }
        if system.operator.ncols() != n {
            return Err(StepperError::dimension(
                "system operator columns",
                n,
                system.operator.ncols(),
            ));
        }
        if system.source.len() != n {
            return Err(StepperError::dimension(
                "source vector",
                n,
                system.source.len(),
            ));
        }
        Ok(system)
    }

    /// Provider residual `F(t, u)`, checked to have length n
    pub fn residual(&self, t: f64, u: &DVector<f64>) -> Result<DVector<f64>, StepperError> {
        let n = self.dofs();
        let residual = self.problem.residual(t, u)?;
        if residual.len() != n {
            return Err(StepperError::dimension("residual", n, residual.len()));
        }
        Ok(residual)
    }

    /// Provider constraints at `t`, every dof checked to be `< n`
    pub fn constraints(&self, t: f64) -> Result<Vec<DirichletBc>, StepperError> {
        let bcs = self.problem.get_bcs(t)?;
        for bc in &bcs {
            check_dofs(bc.dofs(), self.dofs())?;
        }
        Ok(bcs)
    }

    /// Provider preconditioning operator at `t`, checked to be n x n
    pub fn preconditioner(&self, t: f64) -> Result<Option<CsrMatrix<f64>>, StepperError> {
        let n = self.dofs();
        let operator = self.problem.get_preconditioner(t)?;
        if let Some(p) = &operator {
            if p.nrows() != n {
                return Err(StepperError::dimension("preconditioner rows", n, p.nrows()));
            }
            if p.ncols() != n {
                return Err(StepperError::dimension("preconditioner columns", n, p.ncols()));
            }
        }
        Ok(operator)
    }

    /// Check the incoming state against the mass operator
    pub fn check_state(&self, u0: &DVector<f64>) -> Result<(), StepperError> {
        if u0.len() != self.dofs() {
            return Err(StepperError::dimension("state", self.dofs(), u0.len()));
        }
        Ok(())
    }

    // =============================================================================================
    // Solve Dispatch
    // =============================================================================================

    /// Hand one constrained system to the backend
    pub fn solve(
        &self,
        system: &LinearSystem,
        preconditioner_operator: Option<&CsrMatrix<f64>>,
        initial_guess: Option<&DVector<f64>>,
        settings: &SolverSettings,
    ) -> Result<DVector<f64>, StepperError> {
        let mut request = SolveRequest::new(system, settings);
        if let Some(operator) = preconditioner_operator {
            request = request.with_preconditioner_operator(operator);
        }
        if let Some(guess) = initial_guess {
            request = request.with_initial_guess(guess);
        }

        let solution = self.solver.solve(&request)?;
        if solution.len() != system.dim() {
            return Err(StepperError::dimension(
                "solver output",
                system.dim(),
                solution.len(),
            ));
        }
        Ok(solution)
    }
}

/// Every constrained dof must index into a state of length `n`
pub(crate) fn check_dofs(dofs: &[usize], n: usize) -> Result<(), StepperError> {
    match dofs.iter().find(|&&dof| dof >= n) {
        Some(&dof) => Err(StepperError::DimensionMismatch {
            what: format!("Dirichlet dof {dof}"),
            expected: n,
            actual: dof + 1,
        }),
        None => Ok(()),
    }
}

impl<P> fmt::Debug for StepperBase<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepperBase")
            .field("dofs", &self.mass.nrows())
            .field("mass nnz", &self.mass.nnz())
            .field("solver", &self.solver.name())
            .finish()
    }
}
