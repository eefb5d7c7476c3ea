//! Dirichlet boundary data
//!
//! # Two levels of boundary data
//!
//! - [`DirichletBc`]: constraint already evaluated at a given time, i.e. a
//!   list of degrees of freedom and the values prescribed on them. This is
//!   what [`ParabolicProblem::get_bcs`](crate::problem::ParabolicProblem::get_bcs)
//!   returns and what [`LinearSystem::assemble`](crate::linalg::LinearSystem::assemble)
//!   consumes.
//! - [`SymbolicDirichletBc`]: a [`BoundaryRegion`] paired with a
//!   [`BoundaryExpression`], i.e. a time-parameterized value that can be
//!   differentiated in time before being evaluated.
//!
//! Runge-Kutta stages need the first time derivative of the prescribed
//! values (intermediate boundary conditions, D. Pathria, 1995), hence the
//! symbolic level and [`BoundaryConditionDeriver`].
//!
//! # Time derivatives
//!
//! Expressions carry closed-form derivative callbacks keyed by order:
//!
//! ```text
//! g(x, t)       = e^t (1 + x)     order 0
//! dg/dt (x, t)  = e^t (1 + x)     order 1
//! ```
//!
//! Any automatic or symbolic differentiation tool can produce those
//! callbacks; the core only needs orders 0 and 1.

use std::fmt;
use std::sync::Arc;

use crate::error::StepperError;

/// Scalar field of space and time, `g(x, t)`
pub type TimeField = Arc<dyn Fn(&[f64], f64) -> f64 + Send + Sync>;

// =================================================================================================
// Boundary Region
// =================================================================================================

/// Degrees of freedom selected by a region predicate, with their coordinates
///
/// # Example
///
/// ```rust
/// use parabolic_rs::problem::BoundaryRegion;
///
/// let coordinates: Vec<Vec<f64>> = (0..=4).map(|i| vec![i as f64 / 4.0]).collect();
/// let left = BoundaryRegion::from_predicate(&coordinates, |x| x[0] < 1e-12);
///
/// assert_eq!(left.dofs(), &[0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRegion {
    dofs: Vec<usize>,
    points: Vec<Vec<f64>>,
}

impl BoundaryRegion {
    /// Create a region from explicit dofs and their coordinates
    pub fn new(dofs: Vec<usize>, points: Vec<Vec<f64>>) -> Result<Self, StepperError> {
        if dofs.len() != points.len() {
            return Err(StepperError::dimension(
                "boundary region coordinates",
                dofs.len(),
                points.len(),
            ));
        }
        Ok(Self { dofs, points })
    }

    /// Select every dof whose coordinate satisfies `predicate`
    ///
    /// `coordinates[i]` is the coordinate of dof `i`.
    pub fn from_predicate<F>(coordinates: &[Vec<f64>], predicate: F) -> Self
    where
        F: Fn(&[f64]) -> bool,
    {
        let (dofs, points) = coordinates
            .iter()
            .enumerate()
            .filter(|(_, x)| predicate(x.as_slice()))
            .map(|(dof, x)| (dof, x.clone()))
            .unzip();

        Self { dofs, points }
    }

    /// Selected degrees of freedom
    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    /// Coordinates of the selected degrees of freedom
    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// Number of selected dofs
    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    /// True when the predicate selected nothing
    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }
}

// =================================================================================================
// Evaluated Dirichlet Constraint
// =================================================================================================

/// Dirichlet constraint evaluated at a fixed time
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletBc {
    dofs: Vec<usize>,
    values: Vec<f64>,
}

impl DirichletBc {
    /// Prescribe `values[i]` on `dofs[i]`
    pub fn new(dofs: Vec<usize>, values: Vec<f64>) -> Result<Self, StepperError> {
        if dofs.len() != values.len() {
            return Err(StepperError::dimension(
                "Dirichlet values",
                dofs.len(),
                values.len(),
            ));
        }
        Ok(Self { dofs, values })
    }

    /// Prescribe the same value on every dof
    pub fn uniform(dofs: Vec<usize>, value: f64) -> Self {
        let values = vec![value; dofs.len()];
        Self { dofs, values }
    }

    /// Constrained degrees of freedom
    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    /// Prescribed values, aligned with [`dofs`](Self::dofs)
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over `(dof, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.dofs.iter().copied().zip(self.values.iter().copied())
    }

    /// Merge an ordered constraint list into one prescription per dof
    ///
    /// Later constraints overwrite earlier ones on shared dofs.
    pub fn prescribe(bcs: &[DirichletBc], size: usize) -> Result<Vec<Option<f64>>, StepperError> {
        let mut prescribed = vec![None; size];
        for bc in bcs {
            for (dof, value) in bc.iter() {
                if dof >= size {
                    return Err(StepperError::DimensionMismatch {
                        what: format!("Dirichlet dof {dof}"),
                        expected: size,
                        actual: dof + 1,
                    });
                }
                prescribed[dof] = Some(value);
            }
        }
        Ok(prescribed)
    }
}

// =================================================================================================
// Boundary Expression
// =================================================================================================

/// Time-parameterized boundary value with its time derivatives
///
/// `derivatives[k]` is the k-th time derivative. When `vanishing_tail` is
/// set, every derivative beyond the listed ones is identically zero
/// (constant or steady expressions); otherwise asking for it is an error.
#[derive(Clone)]
pub struct BoundaryExpression {
    derivatives: Vec<TimeField>,
    vanishing_tail: bool,
}

impl BoundaryExpression {
    /// Expression known only through its value (order 0)
    pub fn new<F>(value: F) -> Self
    where
        F: Fn(&[f64], f64) -> f64 + Send + Sync + 'static,
    {
        let value: TimeField = Arc::new(value);
        Self {
            derivatives: vec![value],
            vanishing_tail: false,
        }
    }

    /// Append the next time derivative
    ///
    /// # Example
    ///
    /// ```rust
    /// use parabolic_rs::problem::BoundaryExpression;
    ///
    /// let g = BoundaryExpression::new(|x, t| t.sin() * x[0])
    ///     .with_time_derivative(|x, t| t.cos() * x[0]);
    ///
    /// let dg = g.derivative(1).unwrap();
    /// assert!((dg.evaluate(&[2.0], 0.0) - 2.0).abs() < 1e-15);
    /// ```
    pub fn with_time_derivative<F>(mut self, derivative: F) -> Self
    where
        F: Fn(&[f64], f64) -> f64 + Send + Sync + 'static,
    {
        self.derivatives.push(Arc::new(derivative));
        self
    }

    /// Time-independent spatial field; every time derivative vanishes
    pub fn steady<F>(value: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        let value: TimeField = Arc::new(move |x: &[f64], _t: f64| value(x));
        Self {
            derivatives: vec![value],
            vanishing_tail: true,
        }
    }

    /// Constant value in space and time
    pub fn constant(value: f64) -> Self {
        let value: TimeField = Arc::new(move |_: &[f64], _: f64| value);
        Self {
            derivatives: vec![value],
            vanishing_tail: true,
        }
    }

    /// Highest derivative order available, `None` when unbounded
    pub fn max_order(&self) -> Option<usize> {
        if self.vanishing_tail {
            None
        } else {
            Some(self.derivatives.len() - 1)
        }
    }

    /// The `order`-th time derivative as a new expression
    pub fn derivative(&self, order: usize) -> Result<Self, StepperError> {
        if order < self.derivatives.len() {
            return Ok(Self {
                derivatives: self.derivatives[order..].to_vec(),
                vanishing_tail: self.vanishing_tail,
            });
        }
        if self.vanishing_tail {
            return Ok(Self::constant(0.0));
        }
        Err(StepperError::MissingDerivative { order })
    }

    /// Value at point `x` and time `t`
    pub fn evaluate(&self, x: &[f64], t: f64) -> f64 {
        (self.derivatives[0])(x, t)
    }

    /// Freeze the expression at time `t` into a spatial function
    pub fn at(&self, t: f64) -> impl Fn(&[f64]) -> f64 + '_ {
        move |x| self.evaluate(x, t)
    }
}

impl fmt::Debug for BoundaryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryExpression")
            .field("derivatives", &self.derivatives.len())
            .field("vanishing tail", &self.vanishing_tail)
            .finish()
    }
}

// =================================================================================================
// Symbolic Dirichlet Constraint
// =================================================================================================

/// Region paired with a time-parameterized boundary expression
#[derive(Debug, Clone)]
pub struct SymbolicDirichletBc {
    region: BoundaryRegion,
    expression: BoundaryExpression,
}

impl SymbolicDirichletBc {
    pub fn new(region: BoundaryRegion, expression: BoundaryExpression) -> Self {
        Self { region, expression }
    }

    pub fn region(&self) -> &BoundaryRegion {
        &self.region
    }

    pub fn expression(&self) -> &BoundaryExpression {
        &self.expression
    }

    /// Same region, `order`-th time derivative of the expression
    pub fn derivative(&self, order: usize) -> Result<Self, StepperError> {
        Ok(Self {
            region: self.region.clone(),
            expression: self.expression.derivative(order)?,
        })
    }

    /// Evaluate the expression on the region at time `t`
    pub fn evaluate(&self, t: f64) -> DirichletBc {
        let g = self.expression.at(t);
        DirichletBc {
            dofs: self.region.dofs.clone(),
            values: self.region.points.iter().map(|x| g(x.as_slice())).collect(),
        }
    }
}

// =================================================================================================
// Boundary Condition Deriver
// =================================================================================================

/// Precomputed time-derivative sets of a list of symbolic constraints
///
/// `sets[k]` holds the k-th derivative of every constraint, in the original
/// order, so that last-wins semantics survive differentiation.
#[derive(Debug, Clone)]
pub struct BoundaryConditionDeriver {
    sets: Vec<Vec<SymbolicDirichletBc>>,
}

impl BoundaryConditionDeriver {
    /// Differentiate every constraint up to `max_order` (inclusive)
    pub fn new(bcs: &[SymbolicDirichletBc], max_order: usize) -> Result<Self, StepperError> {
        let sets = (0..=max_order)
            .map(|order| {
                bcs.iter()
                    .map(|bc| bc.derivative(order))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { sets })
    }

    /// Highest precomputed derivative order
    pub fn max_order(&self) -> usize {
        self.sets.len() - 1
    }

    /// True when no constraint was supplied
    pub fn is_empty(&self) -> bool {
        self.sets[0].is_empty()
    }

    /// Constraints built from the `order`-th derivative, evaluated at `t`
    pub fn conditions(&self, order: usize, t: f64) -> Result<Vec<DirichletBc>, StepperError> {
        let set = self
            .sets
            .get(order)
            .ok_or(StepperError::MissingDerivative { order })?;

        Ok(set.iter().map(|bc| bc.evaluate(t)).collect())
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_interval(elements: usize) -> Vec<Vec<f64>> {
        (0..=elements)
            .map(|i| vec![i as f64 / elements as f64])
            .collect()
    }

    #[test]
    fn test_region_from_predicate() {
        let coordinates = unit_interval(8);
        let boundary = BoundaryRegion::from_predicate(&coordinates, |x| {
            x[0] < 1e-12 || x[0] > 1.0 - 1e-12
        });

        assert_eq!(boundary.dofs(), &[0, 8]);
        assert_eq!(boundary.points()[1], vec![1.0]);
        assert_eq!(boundary.len(), 2);
    }

    #[test]
    fn test_region_rejects_misaligned_points() {
        let result = BoundaryRegion::new(vec![0, 1], vec![vec![0.0]]);
        assert!(matches!(result, Err(StepperError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_prescribe_last_wins() {
        let first = DirichletBc::uniform(vec![0, 1], 1.0);
        let second = DirichletBc::new(vec![1, 3], vec![5.0, 7.0]).unwrap();

        let prescribed = DirichletBc::prescribe(&[first, second], 4).unwrap();

        assert_eq!(prescribed, vec![Some(1.0), Some(5.0), None, Some(7.0)]);
    }

    #[test]
    fn test_prescribe_rejects_out_of_range_dof() {
        let bc = DirichletBc::uniform(vec![4], 0.0);
        let result = DirichletBc::prescribe(&[bc], 4);
        assert!(matches!(result, Err(StepperError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_expression_derivatives() {
        let g = BoundaryExpression::new(|x, t| (2.0 * t).sin() + x[0])
            .with_time_derivative(|_, t| 2.0 * (2.0 * t).cos());

        assert_eq!(g.max_order(), Some(1));
        assert!((g.evaluate(&[1.0], 0.0) - 1.0).abs() < 1e-15);

        let dg = g.derivative(1).unwrap();
        assert!((dg.evaluate(&[1.0], 0.0) - 2.0).abs() < 1e-15);

        assert_eq!(
            g.derivative(2).unwrap_err(),
            StepperError::MissingDerivative { order: 2 }
        );
    }

    #[test]
    fn test_constant_expression_has_vanishing_derivatives() {
        let g = BoundaryExpression::constant(3.0);
        assert_eq!(g.max_order(), None);
        assert_eq!(g.evaluate(&[0.5], 10.0), 3.0);

        let dg = g.derivative(1).unwrap();
        assert_eq!(dg.evaluate(&[0.5], 10.0), 0.0);

        let steady = BoundaryExpression::steady(|x| 2.0 * x[0]);
        assert_eq!(steady.derivative(3).unwrap().evaluate(&[1.0], 0.0), 0.0);
    }

    #[test]
    fn test_frozen_expression() {
        let g = BoundaryExpression::new(|x, t| x[0] * t);
        let frozen = g.at(3.0);
        assert_eq!(frozen(&[2.0]), 6.0);
    }

    #[test]
    fn test_deriver_evaluates_each_order_at_requested_time() {
        let coordinates = unit_interval(4);
        let right = BoundaryRegion::from_predicate(&coordinates, |x| x[0] > 0.99);
        let g = BoundaryExpression::new(|x, t| t * t * x[0])
            .with_time_derivative(|x, t| 2.0 * t * x[0]);

        let deriver = BoundaryConditionDeriver::new(&[SymbolicDirichletBc::new(right, g)], 1)
            .unwrap();

        let values = deriver.conditions(0, 3.0).unwrap();
        assert_eq!(values[0].dofs(), &[4]);
        assert_eq!(values[0].values(), &[9.0]);

        let rates = deriver.conditions(1, 3.0).unwrap();
        assert_eq!(rates[0].values(), &[6.0]);

        assert!(deriver.conditions(2, 3.0).is_err());
    }

    #[test]
    fn test_deriver_fails_early_without_derivative() {
        let coordinates = unit_interval(2);
        let left = BoundaryRegion::from_predicate(&coordinates, |x| x[0] < 0.01);
        let g = BoundaryExpression::new(|_, t| t.exp());

        let result = BoundaryConditionDeriver::new(&[SymbolicDirichletBc::new(left, g)], 1);
        assert_eq!(result.unwrap_err(), StepperError::MissingDerivative { order: 1 });
    }
}
