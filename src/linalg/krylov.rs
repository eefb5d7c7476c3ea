//! Iterative Krylov solvers
//!
//! # Solvers
//!
//! - [`KrylovMethod::Cg`]: preconditioned conjugate gradients, for symmetric
//!   positive definite systems (mass solves)
//! - [`KrylovMethod::BiCgStab`]: right-preconditioned BiCGStab
//! - [`KrylovMethod::Gmres`]: restarted, right-preconditioned GMRES with
//!   Givens rotations
//!
//! # Convergence
//!
//! Every method stops as soon as `||rhs - A x|| <= tolerance * ||rhs||`
//! (relative tolerance, absolute tolerance 0). Reaching `max_iterations`
//! first is an error ([`StepperError::NotConverged`]), never a silent
//! return of the last iterate.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::DVector;
//! use nalgebra_sparse::CsrMatrix;
//! use parabolic_rs::linalg::{KrylovSolver, LinearSolver, LinearSystem, SolveRequest, SolverSettings};
//!
//! let system = LinearSystem::new(CsrMatrix::identity(3), DVector::from_element(3, 2.0)).unwrap();
//! let settings = SolverSettings::symmetric();
//!
//! let x = KrylovSolver.solve(&SolveRequest::new(&system, &settings)).unwrap();
//! assert!((x[0] - 2.0).abs() < 1e-12);
//! ```

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

use crate::error::StepperError;
use crate::linalg::preconditioner::{Preconditioner, PreconditionerKind};
use crate::linalg::spmv;
use crate::linalg::system::LinearSystem;

/// Denominators below this magnitude are a breakdown of the recurrence.
const BREAKDOWN_THRESHOLD: f64 = 1e-300;

// =================================================================================================
// Settings
// =================================================================================================

/// Krylov method selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KrylovMethod {
    Cg,
    BiCgStab,
    Gmres,
}

impl KrylovMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cg => "CG",
            Self::BiCgStab => "BiCGStab",
            Self::Gmres => "GMRES",
        }
    }
}

/// Parameters of one linear solve
///
/// # Presets
///
/// | Preset          | Method | Preconditioner | Max iterations |
/// |-----------------|--------|----------------|----------------|
/// | [`symmetric`]   | CG     | Jacobi         | 100            |
/// | [`general`]     | GMRES  | ILU(0)         | 1000           |
///
/// Both use a relative tolerance of `1e-10`.
///
/// [`symmetric`]: SolverSettings::symmetric
/// [`general`]: SolverSettings::general
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    /// Relative residual tolerance
    pub tolerance: f64,
    /// Iteration cap; reaching it is an error
    pub max_iterations: usize,
    /// Log every iteration at `info` level
    pub verbose: bool,
    pub method: KrylovMethod,
    pub preconditioner: PreconditionerKind,
    /// GMRES restart length
    pub restart: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::general()
    }
}

impl SolverSettings {
    /// CG with Jacobi, for symmetric positive definite systems
    pub fn symmetric() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
            verbose: false,
            method: KrylovMethod::Cg,
            preconditioner: PreconditionerKind::Jacobi,
            restart: 30,
        }
    }

    /// GMRES with ILU(0), for general systems
    pub fn general() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
            verbose: false,
            method: KrylovMethod::Gmres,
            preconditioner: PreconditionerKind::Ilu,
            restart: 30,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_method(mut self, method: KrylovMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    pub fn with_restart(mut self, restart: usize) -> Self {
        self.restart = restart;
        self
    }

    /// Enable per-iteration progress logging
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn validate(&self) -> Result<(), StepperError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(StepperError::InvalidConfiguration(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(StepperError::InvalidConfiguration(
                "maximum iterations must be positive".to_string(),
            ));
        }
        if self.restart == 0 {
            return Err(StepperError::InvalidConfiguration(
                "GMRES restart length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =================================================================================================
// Solver Interface
// =================================================================================================

/// Everything one linear solve needs
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    /// Constrained system
    pub system: &'a LinearSystem,
    /// Operator the preconditioner is built from; the system matrix when `None`
    pub preconditioner_operator: Option<&'a CsrMatrix<f64>>,
    /// Starting iterate; zero when `None`
    pub initial_guess: Option<&'a DVector<f64>>,
    pub settings: &'a SolverSettings,
}

impl<'a> SolveRequest<'a> {
    pub fn new(system: &'a LinearSystem, settings: &'a SolverSettings) -> Self {
        Self {
            system,
            preconditioner_operator: None,
            initial_guess: None,
            settings,
        }
    }

    pub fn with_preconditioner_operator(mut self, operator: &'a CsrMatrix<f64>) -> Self {
        self.preconditioner_operator = Some(operator);
        self
    }

    pub fn with_initial_guess(mut self, guess: &'a DVector<f64>) -> Self {
        self.initial_guess = Some(guess);
        self
    }

    /// Check settings and dimensions of the optional operands
    pub fn validate(&self) -> Result<(), StepperError> {
        self.settings.validate()?;
        let n = self.system.dim();
        if let Some(guess) = self.initial_guess
            && guess.len() != n
        {
            return Err(StepperError::dimension("initial guess", n, guess.len()));
        }
        if let Some(operator) = self.preconditioner_operator {
            if operator.nrows() != n {
                return Err(StepperError::dimension(
                    "preconditioner rows",
                    n,
                    operator.nrows(),
                ));
            }
            if operator.ncols() != n {
                return Err(StepperError::dimension(
                    "preconditioner columns",
                    n,
                    operator.ncols(),
                ));
            }
        }
        Ok(())
    }
}

/// Linear-algebra backend used by the steppers
///
/// Implementations must either return a solution meeting the requested
/// tolerance or an error; they never return a partially converged iterate.
pub trait LinearSolver: Send + Sync {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<DVector<f64>, StepperError>;

    fn name(&self) -> &str;
}

/// Built-in Krylov backend
#[derive(Debug, Clone, Copy, Default)]
pub struct KrylovSolver;

impl LinearSolver for KrylovSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<DVector<f64>, StepperError> {
        request.validate()?;

        let system = request.system;
        let settings = request.settings;
        let n = system.dim();

        let rhs_norm = system.rhs().norm();
        if rhs_norm == 0.0 {
            return Ok(DVector::zeros(n));
        }

        let operator = request.preconditioner_operator.unwrap_or(system.matrix());
        let preconditioner = Preconditioner::build(settings.preconditioner, operator)?;

        let x0 = request
            .initial_guess
            .cloned()
            .unwrap_or_else(|| DVector::zeros(n));

        let monitor = Monitor {
            method: settings.method.name(),
            rhs_norm,
            target: settings.tolerance * rhs_norm,
            settings,
        };

        let outcome = match settings.method {
            KrylovMethod::Cg => conjugate_gradient(system, &preconditioner, x0, &monitor)?,
            KrylovMethod::BiCgStab => bicgstab(system, &preconditioner, x0, &monitor)?,
            KrylovMethod::Gmres => gmres(system, &preconditioner, x0, &monitor)?,
        };

        monitor.finish(system, outcome)
    }

    fn name(&self) -> &str {
        "Krylov"
    }
}

// =================================================================================================
// Iteration Bookkeeping
// =================================================================================================

/// Result of an iteration loop, before the convergence verdict
struct Outcome {
    solution: DVector<f64>,
    iterations: usize,
    converged: bool,
}

struct Monitor<'a> {
    method: &'static str,
    rhs_norm: f64,
    target: f64,
    settings: &'a SolverSettings,
}

impl Monitor<'_> {
    fn converged(&self, residual_norm: f64) -> bool {
        residual_norm <= self.target
    }

    fn report(&self, iteration: usize, residual_norm: f64) {
        if self.settings.verbose {
            log::info!(
                "{} iteration {}: relative residual {:.3e}",
                self.method,
                iteration,
                residual_norm / self.rhs_norm
            );
        }
    }

    fn breakdown(&self, reason: impl Into<String>) -> StepperError {
        StepperError::Breakdown {
            method: self.method.to_string(),
            reason: reason.into(),
        }
    }

    fn finish(&self, system: &LinearSystem, outcome: Outcome) -> Result<DVector<f64>, StepperError> {
        let relative_residual = system.residual_norm(&outcome.solution) / self.rhs_norm;

        if outcome.converged {
            log::debug!(
                "{} converged in {} iterations (relative residual {:.3e})",
                self.method,
                outcome.iterations,
                relative_residual
            );
            return Ok(outcome.solution);
        }

        log::warn!(
            "{} stopped after {} iterations with relative residual {:.3e} (tolerance {:.3e})",
            self.method,
            outcome.iterations,
            relative_residual,
            self.settings.tolerance
        );
        Err(StepperError::NotConverged {
            method: self.method.to_string(),
            iterations: outcome.iterations,
            relative_residual,
            tolerance: self.settings.tolerance,
        })
    }
}

// =================================================================================================
// Conjugate Gradients
// =================================================================================================

fn conjugate_gradient(
    system: &LinearSystem,
    preconditioner: &Preconditioner,
    mut x: DVector<f64>,
    monitor: &Monitor<'_>,
) -> Result<Outcome, StepperError> {
    let a = system.matrix();
    let mut r = system.rhs() - spmv(a, &x);

    if monitor.converged(r.norm()) {
        return Ok(Outcome { solution: x, iterations: 0, converged: true });
    }

    let mut z = preconditioner.apply(&r);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for iteration in 1..=monitor.settings.max_iterations {
        let ap = spmv(a, &p);
        let pap = p.dot(&ap);
        if pap.is_nan() || pap <= BREAKDOWN_THRESHOLD {
            return Err(monitor.breakdown(format!(
                "p'Ap = {pap:e}; the operator is not symmetric positive definite"
            )));
        }

        let alpha = rz / pap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        let residual_norm = r.norm();
        monitor.report(iteration, residual_norm);
        if monitor.converged(residual_norm) {
            return Ok(Outcome { solution: x, iterations: iteration, converged: true });
        }

        z = preconditioner.apply(&r);
        let rz_next = r.dot(&z);
        let beta = rz_next / rz;
        rz = rz_next;
        p = &z + beta * &p;
    }

    Ok(Outcome {
        solution: x,
        iterations: monitor.settings.max_iterations,
        converged: false,
    })
}

// =================================================================================================
// BiCGStab
// =================================================================================================

fn bicgstab(
    system: &LinearSystem,
    preconditioner: &Preconditioner,
    mut x: DVector<f64>,
    monitor: &Monitor<'_>,
) -> Result<Outcome, StepperError> {
    let a = system.matrix();
    let n = system.dim();
    let mut r = system.rhs() - spmv(a, &x);

    if monitor.converged(r.norm()) {
        return Ok(Outcome { solution: x, iterations: 0, converged: true });
    }

    // Shadow residual, fixed for the whole iteration
    let r_hat = r.clone();
    let mut rho = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;
    let mut v = DVector::zeros(n);
    let mut p = DVector::zeros(n);

    for iteration in 1..=monitor.settings.max_iterations {
        let rho_next = r_hat.dot(&r);
        if rho_next.abs() < BREAKDOWN_THRESHOLD {
            return Err(monitor.breakdown("shadow residual became orthogonal to the residual"));
        }

        let beta = (rho_next / rho) * (alpha / omega);
        p = &r + beta * (&p - omega * &v);

        let p_hat = preconditioner.apply(&p);
        v = spmv(a, &p_hat);
        let r_hat_v = r_hat.dot(&v);
        if r_hat_v.abs() < BREAKDOWN_THRESHOLD {
            return Err(monitor.breakdown("r_hat'v vanished"));
        }
        alpha = rho_next / r_hat_v;

        let s = &r - alpha * &v;
        let s_norm = s.norm();
        if monitor.converged(s_norm) {
            x.axpy(alpha, &p_hat, 1.0);
            monitor.report(iteration, s_norm);
            return Ok(Outcome { solution: x, iterations: iteration, converged: true });
        }

        let s_hat = preconditioner.apply(&s);
        let t = spmv(a, &s_hat);
        let tt = t.dot(&t);
        if tt < BREAKDOWN_THRESHOLD {
            return Err(monitor.breakdown("stabilization step vanished"));
        }
        omega = t.dot(&s) / tt;

        x.axpy(alpha, &p_hat, 1.0);
        x.axpy(omega, &s_hat, 1.0);
        r = s - omega * t;

        let residual_norm = r.norm();
        monitor.report(iteration, residual_norm);
        if monitor.converged(residual_norm) {
            return Ok(Outcome { solution: x, iterations: iteration, converged: true });
        }
        if omega.abs() < BREAKDOWN_THRESHOLD {
            return Err(monitor.breakdown("omega vanished"));
        }

        rho = rho_next;
    }

    Ok(Outcome {
        solution: x,
        iterations: monitor.settings.max_iterations,
        converged: false,
    })
}

// =================================================================================================
// Restarted GMRES
// =================================================================================================

fn gmres(
    system: &LinearSystem,
    preconditioner: &Preconditioner,
    mut x: DVector<f64>,
    monitor: &Monitor<'_>,
) -> Result<Outcome, StepperError> {
    let a = system.matrix();
    let max_iterations = monitor.settings.max_iterations;
    let restart = monitor.settings.restart;
    let mut iterations = 0;

    loop {
        let r = system.rhs() - spmv(a, &x);
        let beta = r.norm();
        if monitor.converged(beta) {
            return Ok(Outcome { solution: x, iterations, converged: true });
        }
        if iterations >= max_iterations {
            return Ok(Outcome { solution: x, iterations, converged: false });
        }

        let mut basis = vec![r / beta];
        let mut directions: Vec<DVector<f64>> = Vec::with_capacity(restart);
        let mut h = DMatrix::<f64>::zeros(restart + 1, restart);
        let mut cs = vec![0.0; restart];
        let mut sn = vec![0.0; restart];
        let mut g = DVector::<f64>::zeros(restart + 1);
        g[0] = beta;

        let mut size = 0;
        let mut residual_norm = beta;

        for j in 0..restart {
            iterations += 1;
            size = j + 1;

            let z = preconditioner.apply(&basis[j]);
            let mut w = spmv(a, &z);
            directions.push(z);

            // Modified Gram-Schmidt
            for (i, v) in basis.iter().enumerate() {
                let hij = w.dot(v);
                h[(i, j)] = hij;
                w.axpy(-hij, v, 1.0);
            }
            let w_norm = w.norm();
            h[(j + 1, j)] = w_norm;

            for i in 0..j {
                let upper = cs[i] * h[(i, j)] + sn[i] * h[(i + 1, j)];
                h[(i + 1, j)] = -sn[i] * h[(i, j)] + cs[i] * h[(i + 1, j)];
                h[(i, j)] = upper;
            }

            let denominator = h[(j, j)].hypot(h[(j + 1, j)]);
            if denominator < BREAKDOWN_THRESHOLD {
                return Err(monitor.breakdown("Hessenberg column vanished"));
            }
            cs[j] = h[(j, j)] / denominator;
            sn[j] = h[(j + 1, j)] / denominator;
            h[(j, j)] = denominator;
            h[(j + 1, j)] = 0.0;
            g[j + 1] = -sn[j] * g[j];
            g[j] *= cs[j];

            residual_norm = g[j + 1].abs();
            monitor.report(iterations, residual_norm);

            // Happy breakdown: the Krylov space is invariant, the solution is exact.
            if monitor.converged(residual_norm)
                || iterations >= max_iterations
                || w_norm < BREAKDOWN_THRESHOLD
            {
                break;
            }
            basis.push(w / w_norm);
        }

        // Back substitution on the triangularized Hessenberg matrix
        let mut y = DVector::<f64>::zeros(size);
        for i in (0..size).rev() {
            let mut sum = g[i];
            for k in i + 1..size {
                sum -= h[(i, k)] * y[k];
            }
            y[i] = sum / h[(i, i)];
        }
        for (i, direction) in directions.iter().enumerate() {
            x.axpy(y[i], direction, 1.0);
        }

        if monitor.converged(residual_norm) {
            return Ok(Outcome { solution: x, iterations, converged: true });
        }
        if iterations >= max_iterations {
            return Ok(Outcome { solution: x, iterations, converged: false });
        }
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::test_support::tridiagonal;
    use approx::assert_relative_eq;

    fn manufactured(a: CsrMatrix<f64>) -> (LinearSystem, DVector<f64>) {
        let exact = DVector::from_fn(a.nrows(), |i, _| ((i + 1) as f64).sqrt());
        let rhs = spmv(&a, &exact);
        (LinearSystem::new(a, rhs).unwrap(), exact)
    }

    fn solve(system: &LinearSystem, settings: &SolverSettings) -> Result<DVector<f64>, StepperError> {
        KrylovSolver.solve(&SolveRequest::new(system, settings))
    }

    #[test]
    fn test_presets() {
        let symmetric = SolverSettings::symmetric();
        assert_eq!(symmetric.method, KrylovMethod::Cg);
        assert_eq!(symmetric.preconditioner, PreconditionerKind::Jacobi);
        assert_eq!(symmetric.max_iterations, 100);

        let general = SolverSettings::general();
        assert_eq!(general.method, KrylovMethod::Gmres);
        assert_eq!(general.preconditioner, PreconditionerKind::Ilu);
        assert_eq!(general.max_iterations, 1000);
        assert_eq!(SolverSettings::default(), general);
    }

    #[test]
    fn test_settings_validation() {
        assert!(SolverSettings::general().validate().is_ok());
        assert!(SolverSettings::general().with_tolerance(0.0).validate().is_err());
        assert!(SolverSettings::general().with_tolerance(f64::NAN).validate().is_err());
        assert!(SolverSettings::general().with_max_iterations(0).validate().is_err());
        assert!(SolverSettings::general().with_restart(0).validate().is_err());
    }

    #[test]
    fn test_cg_solves_spd_system() {
        let (system, exact) = manufactured(tridiagonal(40, -1.0, 2.0, -1.0));
        let settings = SolverSettings::symmetric().with_tolerance(1e-12);

        let x = solve(&system, &settings).unwrap();

        assert_relative_eq!(x, exact, epsilon = 1e-8);
        assert!(system.residual_norm(&x) <= 1e-12 * system.rhs().norm());
    }

    #[test]
    fn test_gmres_solves_nonsymmetric_system() {
        let (system, exact) = manufactured(tridiagonal(50, -2.0, 4.0, -1.0));

        for preconditioner in [PreconditionerKind::None, PreconditionerKind::Jacobi, PreconditionerKind::Ilu] {
            let settings = SolverSettings::general()
                .with_preconditioner(preconditioner)
                .with_restart(5)
                .with_tolerance(1e-12);

            let x = solve(&system, &settings).unwrap();

            assert_relative_eq!(x, exact, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_bicgstab_solves_nonsymmetric_system() {
        let (system, exact) = manufactured(tridiagonal(50, -2.0, 4.0, -1.0));
        let settings = SolverSettings::general()
            .with_method(KrylovMethod::BiCgStab)
            .with_preconditioner(PreconditionerKind::Jacobi)
            .with_tolerance(1e-12);

        let x = solve(&system, &settings).unwrap();

        assert_relative_eq!(x, exact, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_rhs_gives_zero_solution() {
        let system = LinearSystem::new(tridiagonal(5, -1.0, 2.0, -1.0), DVector::zeros(5)).unwrap();
        let guess = DVector::from_element(5, 3.0);
        let settings = SolverSettings::symmetric();

        let request = SolveRequest::new(&system, &settings).with_initial_guess(&guess);
        let x = KrylovSolver.solve(&request).unwrap();

        assert_eq!(x, DVector::zeros(5));
    }

    #[test]
    fn test_exact_initial_guess_needs_no_iteration() {
        let (system, exact) = manufactured(tridiagonal(10, -1.0, 2.0, -1.0));
        let settings = SolverSettings::symmetric().with_max_iterations(1);

        let request = SolveRequest::new(&system, &settings).with_initial_guess(&exact);
        let x = KrylovSolver.solve(&request).unwrap();

        assert_eq!(x, exact);
    }

    #[test]
    fn test_iteration_cap_is_an_error() {
        let (system, _) = manufactured(tridiagonal(60, -1.0, 2.0, -1.0));

        for settings in [
            SolverSettings::symmetric().with_max_iterations(1),
            SolverSettings::general()
                .with_preconditioner(PreconditionerKind::None)
                .with_max_iterations(1),
            SolverSettings::general()
                .with_method(KrylovMethod::BiCgStab)
                .with_preconditioner(PreconditionerKind::None)
                .with_max_iterations(1),
        ] {
            let err = solve(&system, &settings).unwrap_err();
            match err {
                StepperError::NotConverged { iterations, tolerance, .. } => {
                    assert_eq!(iterations, 1);
                    assert_eq!(tolerance, settings.tolerance);
                }
                other => panic!("expected NotConverged, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_cg_reports_indefinite_operator() {
        let mut coo = nalgebra_sparse::CooMatrix::new(2, 2);
        coo.push(0, 0, 1.0);
        coo.push(1, 1, -1.0);
        let system = LinearSystem::new(CsrMatrix::from(&coo), DVector::from_element(2, 1.0)).unwrap();
        let settings = SolverSettings::symmetric().with_preconditioner(PreconditionerKind::None);

        assert!(matches!(
            solve(&system, &settings),
            Err(StepperError::Breakdown { .. })
        ));
    }

    #[test]
    fn test_separate_preconditioner_operator() {
        let (system, exact) = manufactured(tridiagonal(30, -1.0, 3.0, -1.0));
        let approximation = tridiagonal(30, 0.0, 3.0, 0.0);
        let settings = SolverSettings::general().with_tolerance(1e-12);

        let request = SolveRequest::new(&system, &settings).with_preconditioner_operator(&approximation);
        let x = KrylovSolver.solve(&request).unwrap();

        assert_relative_eq!(x, exact, epsilon = 1e-9);
    }

    #[test]
    fn test_request_rejects_mismatched_guess() {
        let (system, _) = manufactured(tridiagonal(4, -1.0, 2.0, -1.0));
        let settings = SolverSettings::symmetric();
        let guess = DVector::zeros(3);

        let request = SolveRequest::new(&system, &settings).with_initial_guess(&guess);

        assert!(matches!(
            KrylovSolver.solve(&request),
            Err(StepperError::DimensionMismatch { .. })
        ));
    }
}
