//! Linear system with Dirichlet constraints eliminated
//!
//! # Design
//!
//! [`LinearSystem`] is immutable: applying constraints is a pure
//! transformation that builds a new matrix and right-hand side, so the
//! operators returned by a provider are never touched.
//!
//! Constraints are eliminated symmetrically: the row *and* column of every
//! constrained dof are replaced by the identity, and the known values are
//! moved to the right-hand side:
//!
//! ```text
//! A_ii = 1, A_ij = A_ji = 0 (j != i)        for constrained i
//! rhs_i = g_i                                for constrained i
//! rhs_k -= A_kj g_j                          for free k, constrained j
//! ```
//!
//! A symmetric positive definite operator stays SPD, which keeps CG usable
//! for the mass solves of explicit schemes.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::StepperError;
use crate::linalg::spmv;
use crate::problem::DirichletBc;

/// Square system `A x = rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    matrix: CsrMatrix<f64>,
    rhs: DVector<f64>,
}

impl LinearSystem {
    /// Wrap an unconstrained system
    pub fn new(matrix: CsrMatrix<f64>, rhs: DVector<f64>) -> Result<Self, StepperError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(StepperError::dimension(
                "system matrix columns",
                matrix.nrows(),
                matrix.ncols(),
            ));
        }
        if rhs.len() != matrix.nrows() {
            return Err(StepperError::dimension(
                "right-hand side",
                matrix.nrows(),
                rhs.len(),
            ));
        }
        Ok(Self { matrix, rhs })
    }

    /// Build `A x = rhs` and eliminate `bcs`
    ///
    /// # Example
    ///
    /// ```rust
    /// use nalgebra::DVector;
    /// use nalgebra_sparse::CsrMatrix;
    /// use parabolic_rs::linalg::LinearSystem;
    /// use parabolic_rs::problem::DirichletBc;
    ///
    /// let a = CsrMatrix::identity(3);
    /// let rhs = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    /// let bcs = vec![DirichletBc::uniform(vec![2], 9.0)];
    ///
    /// let system = LinearSystem::assemble(&a, rhs, &bcs).unwrap();
    /// assert_eq!(system.rhs()[2], 9.0);
    /// ```
    pub fn assemble(
        matrix: &CsrMatrix<f64>,
        rhs: DVector<f64>,
        bcs: &[DirichletBc],
    ) -> Result<Self, StepperError> {
        let system = Self::new(matrix.clone(), rhs)?;
        if bcs.is_empty() {
            return Ok(system);
        }

        let prescribed = DirichletBc::prescribe(bcs, system.dim())?;
        let Self { matrix, mut rhs } = system;

        for (i, row) in matrix.row_iter().enumerate() {
            if let Some(value) = prescribed[i] {
                rhs[i] = value;
                continue;
            }
            for (&j, &a_ij) in row.col_indices().iter().zip(row.values()) {
                if let Some(g_j) = prescribed[j] {
                    rhs[i] -= a_ij * g_j;
                }
            }
        }

        Ok(Self {
            matrix: eliminate(&matrix, &prescribed),
            rhs,
        })
    }

    /// Apply the elimination pattern of `bcs` to an operator alone
    ///
    /// Used for preconditioning operators, which must see the same
    /// constrained rows as the system they precondition.
    pub fn constrain_operator(
        operator: &CsrMatrix<f64>,
        bcs: &[DirichletBc],
    ) -> Result<CsrMatrix<f64>, StepperError> {
        if operator.nrows() != operator.ncols() {
            return Err(StepperError::dimension(
                "preconditioner columns",
                operator.nrows(),
                operator.ncols(),
            ));
        }
        if bcs.is_empty() {
            return Ok(operator.clone());
        }
        let prescribed = DirichletBc::prescribe(bcs, operator.nrows())?;
        Ok(eliminate(operator, &prescribed))
    }

    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Number of unknowns
    pub fn dim(&self) -> usize {
        self.rhs.len()
    }

    /// `|| rhs - A x ||_2`
    pub fn residual_norm(&self, x: &DVector<f64>) -> f64 {
        (&self.rhs - spmv(&self.matrix, x)).norm()
    }
}

/// Replace constrained rows and columns by the identity
fn eliminate(matrix: &CsrMatrix<f64>, prescribed: &[Option<f64>]) -> CsrMatrix<f64> {
    let n = matrix.nrows();
    let mut coo = CooMatrix::new(n, n);

    for (i, row) in matrix.row_iter().enumerate() {
        if prescribed[i].is_some() {
            coo.push(i, i, 1.0);
            continue;
        }
        for (&j, &a_ij) in row.col_indices().iter().zip(row.values()) {
            if prescribed[j].is_none() {
                coo.push(i, j, a_ij);
            }
        }
    }

    CsrMatrix::from(&coo)
}
