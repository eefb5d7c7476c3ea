//! One-dimensional heat equation with P1 finite elements
//!
//! # Mathematical Background
//!
//! ```text
//! du/dt - kappa d2u/dx2 = f(x, t)     on (0, 1)
//! u(0, t) = g_left(t),  u(1, t) = g_right(t)
//! ```
//!
//! On a uniform mesh of `n` elements (`h = 1/n`, nodes `x_i = i h`) with
//! piecewise-linear hat functions, the Galerkin method yields
//!
//! ```text
//! M u' + K u = b(t)
//!
//! M = h/6 tridiag(1, 4, 1)          (h/3 on the two end nodes)
//! K = kappa/h tridiag(-1, 2, -1)    (kappa/h on the two end nodes)
//! b_i(t) = integral of f(x, t) phi_i(x) dx
//! ```
//!
//! `M` and `K` are assembled once; only the load vector depends on time.
//! It is integrated with 5-point Gauss-Legendre quadrature per element,
//! exact for sources up to degree 8 in `x`.
//!
//! # Example
//!
//! ```rust
//! use parabolic_rs::models::Heat1d;
//! use parabolic_rs::problem::{BoundaryExpression, ParabolicProblem};
//!
//! // u = e^t (1 + x) solves u_t - u_xx = e^t (1 + x)
//! let heat = Heat1d::new(10)
//!     .unwrap()
//!     .with_source(|x, t| t.exp() * (1.0 + x[0]))
//!     .with_boundary_values(
//!         BoundaryExpression::new(|_, t| t.exp()).with_time_derivative(|_, t| t.exp()),
//!         BoundaryExpression::new(|_, t| 2.0 * t.exp()).with_time_derivative(|_, t| 2.0 * t.exp()),
//!     );
//!
//! let bcs = heat.get_bcs(0.0).unwrap();
//! assert_eq!(bcs[1].values(), &[2.0]);
//! assert_eq!(heat.mass().nrows(), 11);
//! ```

use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::StepperError;
use crate::linalg::spmv;
use crate::problem::{
    BoundaryExpression, BoundaryRegion, DirichletBc, Linearization, ParabolicProblem,
    SymbolicDirichletBc, TimeField,
};

/// Gauss-Legendre nodes on [-1, 1]
const GAUSS_NODES: [f64; 5] = [
    0.0,
    -0.538_469_310_105_683_1,
    0.538_469_310_105_683_1,
    -0.906_179_845_938_664_0,
    0.906_179_845_938_664_0,
];

/// Gauss-Legendre weights matching [`GAUSS_NODES`]
const GAUSS_WEIGHTS: [f64; 5] = [
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
    0.236_926_885_056_189_1,
];

/// P1 heat equation on the unit interval
///
/// Defaults: `kappa = 1`, `f = 0`, homogeneous Dirichlet data on both ends.
#[derive(Clone)]
pub struct Heat1d {
    elements: usize,
    diffusivity: f64,
    coordinates: Vec<Vec<f64>>,
    mass: CsrMatrix<f64>,
    stiffness: CsrMatrix<f64>,
    source: Option<TimeField>,
    boundary: Vec<SymbolicDirichletBc>,
}

impl Heat1d {
    /// Uniform mesh of `elements` elements (`elements + 1` dofs)
    pub fn new(elements: usize) -> Result<Self, StepperError> {
        if elements == 0 {
            return Err(StepperError::InvalidConfiguration(
                "heat model needs at least one element".to_string(),
            ));
        }

        let h = 1.0 / elements as f64;
        let coordinates: Vec<Vec<f64>> = (0..=elements).map(|i| vec![i as f64 * h]).collect();

        let mut heat = Self {
            elements,
            diffusivity: 1.0,
            mass: assemble_p1(elements, 2.0 * h / 3.0, h / 6.0),
            stiffness: assemble_p1(elements, 2.0 / h, -1.0 / h),
            coordinates,
            source: None,
            boundary: Vec::new(),
        };
        heat.boundary = heat.boundary_regions_with(
            BoundaryExpression::constant(0.0),
            BoundaryExpression::constant(0.0),
        );
        Ok(heat)
    }

    /// Scale the stiffness operator by `kappa > 0`
    pub fn with_diffusivity(mut self, kappa: f64) -> Result<Self, StepperError> {
        if !(kappa.is_finite() && kappa > 0.0) {
            return Err(StepperError::InvalidConfiguration(format!(
                "diffusivity must be positive and finite, got {kappa}"
            )));
        }
        let h = self.h();
        self.diffusivity = kappa;
        self.stiffness = assemble_p1(self.elements, 2.0 * kappa / h, -kappa / h);
        Ok(self)
    }

    /// Right-hand side `f(x, t)`
    pub fn with_source<F>(mut self, source: F) -> Self
    where
        F: Fn(&[f64], f64) -> f64 + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Dirichlet data on `x = 0` and `x = 1`
    ///
    /// Runge-Kutta steppers need the first time derivative of both.
    pub fn with_boundary_values(mut self, left: BoundaryExpression, right: BoundaryExpression) -> Self {
        self.boundary = self.boundary_regions_with(left, right);
        self
    }

    fn boundary_regions_with(
        &self,
        left: BoundaryExpression,
        right: BoundaryExpression,
    ) -> Vec<SymbolicDirichletBc> {
        let half = 0.5 * self.h();
        let left_region = BoundaryRegion::from_predicate(&self.coordinates, |x| x[0] < half);
        let right_region = BoundaryRegion::from_predicate(&self.coordinates, |x| x[0] > 1.0 - half);

        vec![
            SymbolicDirichletBc::new(left_region, left),
            SymbolicDirichletBc::new(right_region, right),
        ]
    }

    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn diffusivity(&self) -> f64 {
        self.diffusivity
    }

    /// Mesh size
    pub fn h(&self) -> f64 {
        1.0 / self.elements as f64
    }

    /// Coordinates of every dof, `coordinates()[i] = [x_i]`
    pub fn coordinates(&self) -> &[Vec<f64>] {
        &self.coordinates
    }

    /// Symbolic Dirichlet data, left end first
    pub fn boundary_conditions(&self) -> Vec<SymbolicDirichletBc> {
        self.boundary.clone()
    }

    /// Nodal interpolant of `f`
    pub fn interpolate<F>(&self, f: F) -> DVector<f64>
    where
        F: Fn(&[f64]) -> f64,
    {
        DVector::from_iterator(
            self.coordinates.len(),
            self.coordinates.iter().map(|x| f(x.as_slice())),
        )
    }

    /// Discrete L2 norm `sqrt(v^T M v)`
    pub fn mass_norm(&self, v: &DVector<f64>) -> f64 {
        v.dot(&spmv(&self.mass, v)).max(0.0).sqrt()
    }

    /// Load vector `b(t)`
    fn load(&self, t: f64) -> DVector<f64> {
        let mut load = DVector::zeros(self.elements + 1);
        let Some(source) = &self.source else {
            return load;
        };

        let h = self.h();
        for element in 0..self.elements {
            let midpoint = (element as f64 + 0.5) * h;
            for (xi, weight) in GAUSS_NODES.iter().zip(GAUSS_WEIGHTS.iter()) {
                let x = [midpoint + 0.5 * h * xi];
                let value = weight * 0.5 * h * source(&x, t);
                load[element] += value * 0.5 * (1.0 - xi);
                load[element + 1] += value * 0.5 * (1.0 + xi);
            }
        }
        load
    }
}

/// Tridiagonal P1 operator with `diag` inside, `diag / 2` on both ends
fn assemble_p1(elements: usize, diag: f64, off_diag: f64) -> CsrMatrix<f64> {
    let n = elements + 1;
    let mut coo = CooMatrix::new(n, n);
    for i in 0..n {
        let value = if i == 0 || i == elements { 0.5 * diag } else { diag };
        coo.push(i, i, value);
        if i + 1 < n {
            coo.push(i, i + 1, off_diag);
            coo.push(i + 1, i, off_diag);
        }
    }
    CsrMatrix::from(&coo)
}

impl ParabolicProblem for Heat1d {
    fn mass(&self) -> CsrMatrix<f64> {
        self.mass.clone()
    }

    fn get_system(&self, t: f64) -> Result<Linearization, StepperError> {
        Ok(Linearization::new(self.stiffness.clone(), self.load(t)))
    }

    fn get_bcs(&self, t: f64) -> Result<Vec<DirichletBc>, StepperError> {
        Ok(self.boundary.iter().map(|bc| bc.evaluate(t)).collect())
    }
}

impl fmt::Debug for Heat1d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heat1d")
            .field("elements", &self.elements)
            .field("diffusivity", &self.diffusivity)
            .field("source", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_rejects_empty_mesh() {
        assert!(matches!(
            Heat1d::new(0),
            Err(StepperError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_diffusivity() {
        assert!(Heat1d::new(4).unwrap().with_diffusivity(0.0).is_err());
        assert!(Heat1d::new(4).unwrap().with_diffusivity(f64::NAN).is_err());
    }

    #[test]
    fn test_mass_integrates_constants() {
        // 1^T M 1 = |(0, 1)|
        let heat = Heat1d::new(7).unwrap();
        let ones = DVector::from_element(8, 1.0);
        assert_relative_eq!(heat.mass_norm(&ones), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_stiffness_annihilates_linear_functions() {
        let heat = Heat1d::new(5).unwrap().with_diffusivity(3.0).unwrap();
        let linear = heat.interpolate(|x| 2.0 + x[0]);
        let ku = spmv(&heat.stiffness, &linear);

        // interior rows vanish, boundary rows carry the flux -kappa u'(0) and kappa u'(1)
        assert_relative_eq!(ku[0], -3.0, epsilon = 1e-12);
        for i in 1..5 {
            assert_relative_eq!(ku[i], 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(ku[5], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_load_of_constant_source() {
        let heat = Heat1d::new(4).unwrap().with_source(|_, t| 2.0 * t);
        let load = heat.get_system(0.5).unwrap().source;

        // f = 1: b_i = h inside, h/2 on the ends
        assert_relative_eq!(load[0], 0.125, epsilon = 1e-14);
        assert_relative_eq!(load[2], 0.25, epsilon = 1e-14);
        assert_relative_eq!(load.sum(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_load_of_smooth_source() {
        // sum_i b_i = integral of f
        let heat = Heat1d::new(3).unwrap().with_source(|x, _| (PI * x[0]).sin());
        let load = heat.get_system(0.0).unwrap().source;
        assert_relative_eq!(load.sum(), 2.0 / PI, epsilon = 1e-8);
    }

    #[test]
    fn test_boundary_conditions_pin_both_ends() {
        let heat = Heat1d::new(6).unwrap().with_boundary_values(
            BoundaryExpression::new(|_, t| t),
            BoundaryExpression::constant(-1.0),
        );

        let bcs = heat.get_bcs(2.0).unwrap();
        assert_eq!(bcs.len(), 2);
        assert_eq!(bcs[0].dofs(), &[0]);
        assert_eq!(bcs[0].values(), &[2.0]);
        assert_eq!(bcs[1].dofs(), &[6]);
        assert_eq!(bcs[1].values(), &[-1.0]);

        let symbolic = heat.boundary_conditions();
        assert_eq!(symbolic[1].region().points(), &[vec![1.0]]);
    }

    #[test]
    fn test_default_boundary_is_homogeneous() {
        let heat = Heat1d::new(2).unwrap();
        let bcs = heat.get_bcs(5.0).unwrap();
        assert!(bcs.iter().all(|bc| bc.values() == [0.0]));
    }
}
