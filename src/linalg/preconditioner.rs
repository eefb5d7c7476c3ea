//! Preconditioners for the Krylov solvers
//!
//! - [`PreconditionerKind::None`]: `z = r`
//! - [`PreconditionerKind::Jacobi`]: `z_i = r_i / A_ii`, order-optimal for
//!   mass matrices
//! - [`PreconditionerKind::Ilu`]: incomplete LU without fill-in, for the
//!   general systems of implicit schemes
//!
//! Every preconditioner is built from an operator once per solve and then
//! only applied.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::error::StepperError;

/// Diagonal entries below this magnitude are treated as missing by Jacobi.
const JACOBI_ZERO_THRESHOLD: f64 = 1e-14;

/// Preconditioner selection in [`SolverSettings`](crate::linalg::SolverSettings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreconditionerKind {
    None,
    #[default]
    Jacobi,
    Ilu,
}

impl PreconditionerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Jacobi => "Jacobi",
            Self::Ilu => "ILU(0)",
        }
    }
}

/// Preconditioner built from a concrete operator
#[derive(Debug, Clone)]
pub enum Preconditioner {
    Identity,
    /// Inverse diagonal
    Jacobi(DVector<f64>),
    Ilu(Ilu0),
}

impl Preconditioner {
    /// Build the preconditioner of kind `kind` from `operator`
    pub fn build(kind: PreconditionerKind, operator: &CsrMatrix<f64>) -> Result<Self, StepperError> {
        match kind {
            PreconditionerKind::None => Ok(Self::Identity),
            PreconditionerKind::Jacobi => {
                let inverse = crate::linalg::diagonal(operator).map(|d| {
                    if d.abs() > JACOBI_ZERO_THRESHOLD {
                        1.0 / d
                    } else {
                        1.0
                    }
                });
                Ok(Self::Jacobi(inverse))
            }
            PreconditionerKind::Ilu => Ok(Self::Ilu(Ilu0::factorize(operator)?)),
        }
    }

    /// `z = P^-1 r`
    pub fn apply(&self, r: &DVector<f64>) -> DVector<f64> {
        match self {
            Self::Identity => r.clone(),
            Self::Jacobi(inverse) => r.component_mul(inverse),
            Self::Ilu(ilu) => ilu.solve(r),
        }
    }
}

// =================================================================================================
// ILU(0)
// =================================================================================================

/// Incomplete LU factorization restricted to the pattern of the operator
///
/// `L` (unit lower) and `U` share the CSR storage of the operator; `diag[i]`
/// is the position of `U_ii` in row `i`.
#[derive(Debug, Clone)]
pub struct Ilu0 {
    offsets: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<f64>,
    diag: Vec<usize>,
}

impl Ilu0 {
    /// Factorize `operator` in place of a copy of its values
    ///
    /// Fails with [`StepperError::Breakdown`] on a missing or zero pivot.
    pub fn factorize(operator: &CsrMatrix<f64>) -> Result<Self, StepperError> {
        let n = operator.nrows();
        let (offsets, columns, values) = operator.csr_data();
        let offsets = offsets.to_vec();
        let columns = columns.to_vec();
        let mut values = values.to_vec();

        let mut diag = Vec::with_capacity(n);
        for i in 0..n {
            let row = &columns[offsets[i]..offsets[i + 1]];
            let position = row.binary_search(&i).map_err(|_| StepperError::Breakdown {
                method: "ILU(0)".to_string(),
                reason: format!("row {i} has no diagonal entry"),
            })?;
            diag.push(offsets[i] + position);
        }

        for i in 0..n {
            let end = offsets[i + 1];

            for p in offsets[i]..diag[i] {
                let k = columns[p];
                let factor = values[p] / values[diag[k]];
                values[p] = factor;

                let row_k = &columns[diag[k] + 1..offsets[k + 1]];
                for q in p + 1..end {
                    if let Ok(found) = row_k.binary_search(&columns[q]) {
                        let update = factor * values[diag[k] + 1 + found];
                        values[q] -= update;
                    }
                }
            }

            // Rows are processed in order, so every pivot used above was checked here.
            if values[diag[i]] == 0.0 {
                return Err(StepperError::Breakdown {
                    method: "ILU(0)".to_string(),
                    reason: format!("zero pivot in row {i}"),
                });
            }
        }

        Ok(Self {
            offsets,
            columns,
            values,
            diag,
        })
    }

    /// Solve `L U z = r`
    pub fn solve(&self, r: &DVector<f64>) -> DVector<f64> {
        let n = self.diag.len();
        let mut z = r.clone();

        for i in 0..n {
            let mut sum = z[i];
            for p in self.offsets[i]..self.diag[i] {
                sum -= self.values[p] * z[self.columns[p]];
            }
            z[i] = sum;
        }

        for i in (0..n).rev() {
            let mut sum = z[i];
            for p in self.diag[i] + 1..self.offsets[i + 1] {
                sum -= self.values[p] * z[self.columns[p]];
            }
            z[i] = sum / self.values[self.diag[i]];
        }

        z
    }
}
