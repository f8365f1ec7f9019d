//! One-dimensional projectors sharing their factorizations.

use crate::basis::{compute_greville, evaluate_spline, reduce_knots};
use crate::error::SplineError;
use crate::functionals::{Contribution, Integral, Interpolation};
use crate::linalg::sparse::{SparseLuFactor, sparse_matvec};
use crate::linalg::utils::KahanSum;
use crate::matrices::{check_space, collocation_matrix, histopolation_matrix, mass_matrix};
use crate::quadrature::QuadratureGrid;
use crate::scaling::scaling_matrix_1d;
use crate::types::{IntegralKind, ProjectionOptions};
use faer::sparse::SparseColMat;
use ndarray::{Array1, ArrayView1};

/// Interpolation, histopolation and L2 projection onto one spline space.
///
/// The collocation, histopolation and mass matrices are assembled and
/// factorized once; every projection afterwards is a right-hand side
/// evaluation plus a solve.
pub struct Projector1D {
    degree: usize,
    knots: Array1<f64>,
    reduced_knots: Array1<f64>,
    interpolation: Interpolation,
    integral: Integral,
    contribution: Contribution,
    collocation: SparseLuFactor,
    histopolation: SparseLuFactor,
    mass: SparseLuFactor,
    scaling: SparseColMat<usize, f64>,
}

impl Projector1D {
    pub fn new(
        degree: usize,
        dimension: usize,
        knots: ArrayView1<f64>,
        options: &ProjectionOptions,
    ) -> Result<Self, SplineError> {
        check_space(degree, dimension, knots)?;
        let greville = compute_greville(degree, dimension, knots)?;
        let reduced_knots = reduce_knots(knots)?;

        let collocation = collocation_matrix(degree, dimension, knots, greville.view(), options)?;
        let histopolation =
            histopolation_matrix(degree, dimension, knots, greville.view(), options)?;
        let mass = mass_matrix(degree, dimension, knots, options)?;

        Ok(Self {
            degree,
            knots: knots.to_owned(),
            interpolation: Interpolation::new(degree, dimension, knots)?,
            integral: Integral::with_options(
                degree,
                dimension,
                knots,
                IntegralKind::Greville,
                options,
            )?,
            contribution: Contribution::with_options(degree, dimension, knots, options)?,
            collocation: SparseLuFactor::factorize(&collocation, "collocation")?,
            histopolation: SparseLuFactor::factorize(&histopolation, "histopolation")?,
            mass: SparseLuFactor::factorize(&mass, "mass")?,
            scaling: scaling_matrix_1d(degree - 1, dimension - 1, reduced_knots.view())?,
            reduced_knots,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> ArrayView1<'_, f64> {
        self.knots.view()
    }

    /// Knots of the histopolation target space, `T[1:-1]`.
    pub fn reduced_knots(&self) -> ArrayView1<'_, f64> {
        self.reduced_knots.view()
    }

    pub fn greville(&self) -> ArrayView1<'_, f64> {
        self.interpolation.points()
    }

    /// Coefficients of the spline matching `f` at the Greville points.
    pub fn interpolate<F: Fn(f64) -> f64>(&self, f: F) -> Result<Array1<f64>, SplineError> {
        Ok(self.collocation.solve(&self.interpolation.apply(f))?)
    }

    /// B-spline coefficients, in the space of degree `degree - 1` on the
    /// reduced knots, of the spline whose integrals between consecutive
    /// Greville points match those of `f`.
    pub fn histopolate<F: Fn(f64) -> f64>(&self, f: F) -> Result<Array1<f64>, SplineError> {
        let mspline = self.histopolation.solve(&self.integral.apply(f))?;
        Ok(sparse_matvec(&self.scaling, &mspline)?)
    }

    /// Galerkin projection: `Mass c = (∫ f B_i)_i`.
    pub fn l2_project<F: Fn(f64) -> f64>(&self, f: F) -> Result<Array1<f64>, SplineError> {
        Ok(self.mass.solve(&self.contribution.apply(f))?)
    }
}

/// `‖f - Σ c_i B_i‖_L2` on the domain of `knots`, by Gauss–Legendre
/// quadrature on each knot cell.
pub fn l2_error<F: Fn(f64) -> f64>(
    f: F,
    coeffs: ArrayView1<f64>,
    degree: usize,
    knots: ArrayView1<f64>,
) -> Result<f64, SplineError> {
    let grid = QuadratureGrid::from_knots(knots, degree + 2)?;
    let mut acc = KahanSum::default();
    for ie in 0..grid.ncells() {
        for iq in 0..grid.num_points() {
            let x = grid.points[[ie, iq]];
            let diff = f(x) - evaluate_spline(knots, coeffs, degree, x)?;
            acc.add(grid.weights[[ie, iq]] * diff * diff);
        }
    }
    let error = acc.sum().max(0.0).sqrt();
    if !error.is_finite() {
        log::warn!("L2 error is not finite; the field or coefficients contain NaN or infinity");
    }
    Ok(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{evaluate_spline_derivative, make_open_knots};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::PI;

    fn projector(degree: usize, dimension: usize) -> Projector1D {
        let knots = make_open_knots(degree, dimension).unwrap();
        Projector1D::new(degree, dimension, knots.view(), &ProjectionOptions::default()).unwrap()
    }

    #[test]
    fn quadratic_field_is_reproduced_by_every_projector() {
        let proj = projector(3, 6);
        let f = |u: f64| u * (1.0 - u);

        let interp = proj.interpolate(f).unwrap();
        let galerkin = proj.l2_project(f).unwrap();
        let e_interp = l2_error(f, interp.view(), 3, proj.knots()).unwrap();
        let e_galerkin = l2_error(f, galerkin.view(), 3, proj.knots()).unwrap();
        assert!(e_interp.is_finite() && e_interp < 1e-12);
        assert!(e_galerkin.is_finite() && e_galerkin < 1e-12);

        let histo = proj.histopolate(f).unwrap();
        assert_eq!(histo.len(), 5);
        let e_histo = l2_error(f, histo.view(), 2, proj.reduced_knots()).unwrap();
        assert!(e_histo.is_finite() && e_histo < 1e-12);
    }

    #[test]
    fn interpolation_and_galerkin_errors_are_comparable() {
        let proj = projector(3, 12);
        let f = |u: f64| (2.0 * PI * u).sin();
        let interp = proj.interpolate(f).unwrap();
        let galerkin = proj.l2_project(f).unwrap();
        let e_interp = l2_error(f, interp.view(), 3, proj.knots()).unwrap();
        let e_galerkin = l2_error(f, galerkin.view(), 3, proj.knots()).unwrap();
        assert!(e_galerkin > 0.0);
        assert!(e_galerkin <= e_interp * 1.01);
        assert!(e_interp < 10.0 * e_galerkin);
    }

    #[test]
    fn derivative_of_interpolant_is_histopolant_of_derivative() {
        let knots = make_open_knots(3, 9).unwrap();
        let options = ProjectionOptions {
            quadrature_points: Some(8),
            ..ProjectionOptions::default()
        };
        let proj = Projector1D::new(3, 9, knots.view(), &options).unwrap();
        let f = |u: f64| (3.0 * u).exp() * (PI * u).cos();
        let df = |u: f64| (3.0 * u).exp() * (3.0 * (PI * u).cos() - PI * (PI * u).sin());

        let coeffs = proj.interpolate(f).unwrap();
        let histo = proj.histopolate(df).unwrap();
        for &x in &[0.0, 0.21, 0.5, 0.83, 1.0] {
            let derivative =
                evaluate_spline_derivative(proj.knots(), coeffs.view(), 3, 1, x).unwrap();
            let reduced = evaluate_spline(proj.reduced_knots(), histo.view(), 2, x).unwrap();
            assert_relative_eq!(derivative, reduced, epsilon = 1e-8, max_relative = 1e-8);
        }
    }

    #[test]
    fn derivative_of_interpolant_is_histopolant_of_derivative_on_nonuniform_knots() {
        let knots = ndarray::array![
            0.0, 0.0, 0.0, 0.0, 0.1, 0.35, 0.5, 0.5, 0.9, 1.0, 1.0, 1.0, 1.0
        ];
        // quartic derivative: five Gauss points per piece integrate it exactly
        let options = ProjectionOptions {
            quadrature_points: Some(5),
            ..ProjectionOptions::default()
        };
        let exact = Projector1D::new(3, 9, knots.view(), &options).unwrap();
        let f = |u: f64| u.powi(5) - 2.0 * u * u + 0.3 * u;
        let df = |u: f64| 5.0 * u.powi(4) - 4.0 * u + 0.3;

        let coeffs = exact.interpolate(f).unwrap();
        let histo = exact.histopolate(df).unwrap();
        for &x in &[0.0, 0.05, 0.2, 0.49, 0.5, 0.51, 0.77, 1.0] {
            let derivative = evaluate_spline_derivative(knots.view(), coeffs.view(), 3, 1, x).unwrap();
            let reduced = evaluate_spline(exact.reduced_knots(), histo.view(), 2, x).unwrap();
            assert_abs_diff_eq!(derivative, reduced, epsilon = 1e-12);
        }

        // the same coefficients, independently of the quadrature
        let scaled_diff: Vec<f64> = (0..8)
            .map(|j| 3.0 / (knots[j + 4] - knots[j + 1]) * (coeffs[j + 1] - coeffs[j]))
            .collect();
        for (a, b) in histo.iter().zip(&scaled_diff) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10 * (1.0 + b.abs()));
        }
        assert_eq!(exact.greville().len(), 9);
    }

    #[test]
    fn end_to_end_interpolation_matches_midpoint_value() {
        let proj = projector(3, 6);
        let coeffs = proj.interpolate(|u| u * (1.0 - u)).unwrap();
        let value = evaluate_spline(proj.knots(), coeffs.view(), 3, 0.5).unwrap();
        assert_abs_diff_eq!(value, 0.25, epsilon = 1e-2);
        assert_eq!(proj.greville().len(), 6);
    }

    #[test]
    fn zero_field_projects_to_zero() {
        let proj = projector(2, 5);
        for coeffs in [
            proj.interpolate(|_| 0.0).unwrap(),
            proj.histopolate(|_| 0.0).unwrap(),
            proj.l2_project(|_| 0.0).unwrap(),
        ] {
            assert!(coeffs.iter().all(|&c| c == 0.0));
        }
    }

    #[test]
    fn degree_zero_has_no_histopolation() {
        let knots = make_open_knots(0, 4).unwrap();
        assert!(Projector1D::new(0, 4, knots.view(), &ProjectionOptions::default()).is_err());
    }
}
