//! Sparse linear algebra backend
//!
//! The time steppers only need three things from linear algebra:
//!
//! 1. Sparse operators and matrix-vector products ([`spmv`],
//!    [`linear_combination`]) on `nalgebra-sparse` CSR matrices
//! 2. An immutable system object with Dirichlet rows eliminated
//!    ([`LinearSystem`])
//! 3. An iterative solver behind the [`LinearSolver`] trait
//!    ([`KrylovSolver`]: CG, BiCGStab, restarted GMRES)
//!
//! Users with their own backend implement [`LinearSolver`] and hand it to
//! [`StepperBase::with_solver`](crate::solver::StepperBase::with_solver).
//!
//! # Parallelism
//!
//! With the `parallel` feature, [`spmv`] dispatches rows to rayon once the
//! operator has at least [`parallel_threshold()`] rows. The steppers never
//! see this: each step stays a sequence of dependent solves.

mod krylov;
mod preconditioner;
mod system;

use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::StepperError;

pub use krylov::{KrylovMethod, KrylovSolver, LinearSolver, SolveRequest, SolverSettings};
pub use preconditioner::{Ilu0, Preconditioner, PreconditionerKind};
pub use system::LinearSystem;

/// Sparse operator type used throughout the crate
pub type SparseOperator = CsrMatrix<f64>;

// =================================================================================================
// Parallel Execution Threshold
// =================================================================================================

/// Default number of rows above which [`spmv`] switches to rayon.
const DEFAULT_PARALLEL_THRESHOLD: usize = 999;

static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Current parallel-execution threshold (rows)
///
/// Only consulted when the crate is compiled with the `parallel` feature.
///
/// ```rust
/// use parabolic_rs::linalg::parallel_threshold;
///
/// assert!(parallel_threshold() > 0);
/// ```
pub fn parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

/// Set the parallel-execution threshold
///
/// # Panics
///
/// Panics when `threshold == 0`.
pub fn set_parallel_threshold(threshold: usize) {
    assert!(threshold > 0, "parallel threshold must be at least 1");
    PARALLEL_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// Saves the threshold on construction and restores it on drop
#[cfg(test)]
pub(crate) struct ThresholdGuard {
    previous: usize,
}

#[cfg(test)]
impl ThresholdGuard {
    pub(crate) fn save(new_value: usize) -> Self {
        let previous = parallel_threshold();
        set_parallel_threshold(new_value);
        Self { previous }
    }
}

#[cfg(test)]
impl Drop for ThresholdGuard {
    fn drop(&mut self) {
        PARALLEL_THRESHOLD.store(self.previous, Ordering::Relaxed);
    }
}

// =================================================================================================
// Operator Helpers
// =================================================================================================

/// Sparse matrix-vector product `A x`
///
/// The caller guarantees `x.len() == a.ncols()`.
pub fn spmv(a: &SparseOperator, x: &DVector<f64>) -> DVector<f64> {
    let row_dot = |i: usize| -> f64 {
        let row = a.row(i);
        row.col_indices()
            .iter()
            .zip(row.values())
            .map(|(&j, &v)| v * x[j])
            .sum()
    };

    #[cfg(feature = "parallel")]
    {
        if a.nrows() >= parallel_threshold() {
            let values: Vec<f64> = (0..a.nrows()).into_par_iter().map(&row_dot).collect();
            return DVector::from_vec(values);
        }
    }

    DVector::from_iterator(a.nrows(), (0..a.nrows()).map(row_dot))
}

/// `alpha A + beta B` for two operators of the same shape
///
/// The sparsity pattern of the result is the union of both patterns.
pub fn linear_combination(
    alpha: f64,
    a: &SparseOperator,
    beta: f64,
    b: &SparseOperator,
) -> Result<SparseOperator, StepperError> {
    if a.nrows() != b.nrows() {
        return Err(StepperError::dimension("operator rows", a.nrows(), b.nrows()));
    }
    if a.ncols() != b.ncols() {
        return Err(StepperError::dimension("operator columns", a.ncols(), b.ncols()));
    }

    let mut coo = CooMatrix::new(a.nrows(), a.ncols());
    for (i, j, &v) in a.triplet_iter() {
        coo.push(i, j, alpha * v);
    }
    for (i, j, &v) in b.triplet_iter() {
        coo.push(i, j, beta * v);
    }

    // Duplicate entries are summed by the conversion.
    Ok(CsrMatrix::from(&coo))
}

/// Diagonal entries of `a`, zero where the pattern has no diagonal
pub fn diagonal(a: &SparseOperator) -> DVector<f64> {
    DVector::from_iterator(
        a.nrows(),
        (0..a.nrows()).map(|i| {
            let row = a.row(i);
            row.col_indices()
                .binary_search(&i)
                .map(|k| row.values()[k])
                .unwrap_or(0.0)
        }),
    )
}


// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::test_support::tridiagonal;
    use super::*;

    #[test]
    fn test_default_threshold_value() {
        assert_eq!(DEFAULT_PARALLEL_THRESHOLD, 999);
    }

    #[test]
    fn test_threshold_guard_restores_previous_value() {
        let before = parallel_threshold();
        {
            let _guard = ThresholdGuard::save(42);
            assert_eq!(parallel_threshold(), 42);
        }
        assert_eq!(parallel_threshold(), before);
    }

    #[test]
    #[should_panic(expected = "parallel threshold must be at least 1")]
    fn test_zero_threshold_panics() {
        set_parallel_threshold(0);
    }

    #[test]
    fn test_spmv_tridiagonal() {
        let a = tridiagonal(4, -1.0, 2.0, -1.0);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);

        let y = spmv(&a, &x);

        assert_eq!(y.as_slice(), &[0.0, 0.0, 0.0, 5.0]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_spmv_matches_serial() {
        let n = 257;
        let a = tridiagonal(n, -1.0, 2.5, -1.2);
        let x = DVector::from_fn(n, |i, _| (i as f64 * 0.37).sin());

        let serial = DVector::from_iterator(
            n,
            a.row_iter().map(|row| {
                row.col_indices()
                    .iter()
                    .zip(row.values())
                    .map(|(&j, &v)| v * x[j])
                    .sum::<f64>()
            }),
        );

        let _guard = ThresholdGuard::save(1);
        let parallel = spmv(&a, &x);

        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_spmv_rectangular_operator() {
        let mut coo = CooMatrix::new(2, 3);
        coo.push(0, 0, 1.0);
        coo.push(0, 2, 2.0);
        coo.push(1, 1, -1.0);
        let a = CsrMatrix::from(&coo);

        let y = spmv(&a, &DVector::from_vec(vec![1.0, 2.0, 3.0]));

        assert_eq!(y.as_slice(), &[7.0, -2.0]);
    }

    #[test]
    fn test_linear_combination_merges_patterns() {
        let mass = tridiagonal(3, 1.0, 4.0, 1.0);
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 2, 1.0);
        coo.push(1, 1, 1.0);
        let other = CsrMatrix::from(&coo);

        let combined = linear_combination(1.0, &mass, 2.0, &other).unwrap();

        assert_eq!(combined.get_entry(0, 2).unwrap().into_value(), 2.0);
        assert_eq!(combined.get_entry(1, 1).unwrap().into_value(), 6.0);
        assert_eq!(combined.get_entry(2, 1).unwrap().into_value(), 1.0);
    }

    #[test]
    fn test_linear_combination_rejects_shape_mismatch() {
        let a = tridiagonal(3, 1.0, 4.0, 1.0);
        let b = tridiagonal(4, 1.0, 4.0, 1.0);
        assert!(matches!(
            linear_combination(1.0, &a, 1.0, &b),
            Err(StepperError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_diagonal_extraction() {
        let a = tridiagonal(3, -1.0, 2.5, -1.0);
        assert_eq!(diagonal(&a).as_slice(), &[2.5, 2.5, 2.5]);
    }
}
