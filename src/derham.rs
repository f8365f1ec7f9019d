//! Commuting projectors onto the 2D tensor-product de Rham sequence
//! `H1 -> H(curl) -> L2`.
//!
//! With `M_d` the collocation and `H_d` the histopolation matrix of
//! direction `d`, the three global systems are
//!
//! * `H1    = M_0 ⊗ M_1`
//! * `Hcurl = diag(H_0 ⊗ M_1, M_0 ⊗ H_1)`
//! * `L2    = H_0 ⊗ H_1`
//!
//! Unknowns are flattened row-major (`i0 * n1 + i1`), matching
//! [`crate::functionals::to_array_h1`] and friends.

use crate::basis::{basis_funs_ders, compute_greville, reduce_knots};
use crate::error::SplineError;
use crate::functionals::{Interpolation2D, to_array_h1, to_array_hcurl, to_array_l2};
use crate::linalg::sparse::{SparseLuFactor, sparse_block_diag, sparse_kron, sparse_matvec};
use crate::matrices::{check_space, collocation_matrix, histopolation_matrix};
use crate::scaling::scaling_matrix;
use crate::types::{DeRhamSpace, ProjectionOptions, ScalingKind};
use faer::sparse::SparseColMat;
use ndarray::{Array1, Array2, ArrayView1};

/// The three global system matrices of the 2D sequence.
#[derive(Clone, Debug)]
pub struct DeRhamMatrices {
    pub h1: SparseColMat<usize, f64>,
    pub hcurl: SparseColMat<usize, f64>,
    pub l2: SparseColMat<usize, f64>,
}

impl DeRhamMatrices {
    pub fn matrix(&self, space: DeRhamSpace) -> &SparseColMat<usize, f64> {
        match space {
            DeRhamSpace::H1 => &self.h1,
            DeRhamSpace::Hcurl => &self.hcurl,
            DeRhamSpace::L2 => &self.l2,
        }
    }
}

pub fn build_matrices_2d_h1(
    degrees: [usize; 2],
    dimensions: [usize; 2],
    knots: [ArrayView1<f64>; 2],
) -> Result<DeRhamMatrices, SplineError> {
    build_matrices_2d_h1_with_options(degrees, dimensions, knots, &ProjectionOptions::default())
}

pub fn build_matrices_2d_h1_with_options(
    degrees: [usize; 2],
    dimensions: [usize; 2],
    knots: [ArrayView1<f64>; 2],
    options: &ProjectionOptions,
) -> Result<DeRhamMatrices, SplineError> {
    let mut collocation = Vec::with_capacity(2);
    let mut histopolation = Vec::with_capacity(2);
    for d in 0..2 {
        let (p, n, t) = (degrees[d], dimensions[d], knots[d]);
        check_space(p, n, t)?;
        let greville = compute_greville(p, n, t)?;
        collocation.push(collocation_matrix(p, n, t, greville.view(), options)?);
        histopolation.push(histopolation_matrix(p, n, t, greville.view(), options)?);
    }
    let (m0, m1) = (&collocation[0], &collocation[1]);
    let (h0, h1) = (&histopolation[0], &histopolation[1]);

    let matrices = DeRhamMatrices {
        h1: sparse_kron(m0, m1)?,
        hcurl: sparse_block_diag(&[sparse_kron(h0, m1)?, sparse_kron(m0, h1)?])?,
        l2: sparse_kron(h0, h1)?,
    };
    log::debug!(
        "de Rham matrices: H1 {n}x{n}, Hcurl {c}x{c}, L2 {l}x{l}",
        n = matrices.h1.nrows(),
        c = matrices.hcurl.nrows(),
        l = matrices.l2.nrows()
    );
    Ok(matrices)
}

/// A 2D tensor-product spline `Σ c_ij B_i(x) B_j(y)`.
///
/// Only constructed through [`TensorSplineRepr::new`], so the coefficient
/// shape always matches the knots and degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorSplineRepr {
    knots: [Array1<f64>; 2],
    coefficients: Array2<f64>,
    degrees: [usize; 2],
}

impl TensorSplineRepr {
    pub fn new(
        knots: [Array1<f64>; 2],
        coefficients: Array2<f64>,
        degrees: [usize; 2],
    ) -> Result<Self, SplineError> {
        let (c0, c1) = coefficients.dim();
        check_space(degrees[0], c0, knots[0].view())?;
        check_space(degrees[1], c1, knots[1].view())?;
        Ok(Self {
            knots,
            coefficients,
            degrees,
        })
    }

    fn reshape(
        knots: [Array1<f64>; 2],
        flat: ArrayView1<f64>,
        degrees: [usize; 2],
    ) -> Result<Self, SplineError> {
        let shape = (
            knots[0].len().saturating_sub(degrees[0] + 1),
            knots[1].len().saturating_sub(degrees[1] + 1),
        );
        SplineError::check_len("tensor coefficients", shape.0 * shape.1, flat.len())?;
        let coefficients = Array2::from_shape_fn(shape, |(i, j)| flat[i * shape.1 + j]);
        Self::new(knots, coefficients, degrees)
    }

    pub fn knots(&self) -> [ArrayView1<'_, f64>; 2] {
        [self.knots[0].view(), self.knots[1].view()]
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    pub fn degrees(&self) -> [usize; 2] {
        self.degrees
    }

    pub fn eval(&self, x: f64, y: f64) -> f64 {
        self.eval_derivative(x, y, [0, 0])
    }

    /// Mixed partial derivative of orders `[dx, dy]`.
    pub fn eval_derivative(&self, x: f64, y: f64, orders: [usize; 2]) -> f64 {
        let [p0, p1] = self.degrees;
        let (bx, sx) = basis_funs_ders(x, p0, self.knots[0].view(), orders[0]);
        let (by, sy) = basis_funs_ders(y, p1, self.knots[1].view(), orders[1]);
        let mut acc = 0.0;
        for a in 0..=p0 {
            let wx = bx[[orders[0], a]];
            if wx == 0.0 {
                continue;
            }
            for b in 0..=p1 {
                acc += wx * by[[orders[1], b]] * self.coefficients[[sx + a, sy + b]];
            }
        }
        acc
    }
}

fn owned_knots(knots: [ArrayView1<f64>; 2]) -> [Array1<f64>; 2] {
    [knots[0].to_owned(), knots[1].to_owned()]
}

pub fn tck_h1(
    degrees: [usize; 2],
    knots: [ArrayView1<f64>; 2],
    coefficients: ArrayView1<f64>,
) -> Result<TensorSplineRepr, SplineError> {
    TensorSplineRepr::reshape(owned_knots(knots), coefficients, degrees)
}

/// Splits the stacked coefficients into the `(n0 - 1) * n1` and
/// `n0 * (n1 - 1)` components.
pub fn tck_hcurl(
    degrees: [usize; 2],
    knots: [ArrayView1<f64>; 2],
    coefficients: ArrayView1<f64>,
) -> Result<[TensorSplineRepr; 2], SplineError> {
    let [p0, p1] = degrees;
    if p0 == 0 || p1 == 0 {
        return Err(SplineError::InvalidInput(
            "H(curl) needs degree at least 1 in every direction".to_string(),
        ));
    }
    let [t0, t1] = owned_knots(knots);
    let (r0, r1) = (reduce_knots(t0.view())?, reduce_knots(t1.view())?);
    let first_len = (r0.len().saturating_sub(p0)) * (t1.len().saturating_sub(p1 + 1));
    if coefficients.len() < first_len {
        return Err(SplineError::DimensionMismatch {
            what: "H(curl) coefficients",
            expected: first_len,
            found: coefficients.len(),
        });
    }
    let (first, second) = coefficients.split_at(ndarray::Axis(0), first_len);
    Ok([
        TensorSplineRepr::reshape([r0, t1], first, [p0 - 1, p1])?,
        TensorSplineRepr::reshape([t0, r1], second, [p0, p1 - 1])?,
    ])
}

pub fn tck_l2(
    degrees: [usize; 2],
    knots: [ArrayView1<f64>; 2],
    coefficients: ArrayView1<f64>,
) -> Result<TensorSplineRepr, SplineError> {
    let [p0, p1] = degrees;
    if p0 == 0 || p1 == 0 {
        return Err(SplineError::InvalidInput(
            "L2 needs degree at least 1 in every direction".to_string(),
        ));
    }
    let reduced = [reduce_knots(knots[0])?, reduce_knots(knots[1])?];
    TensorSplineRepr::reshape(reduced, coefficients, [p0 - 1, p1 - 1])
}

/// Projectors onto the three spaces, with every system factorized once.
pub struct DeRhamProjector2D {
    degrees: [usize; 2],
    knots: [Array1<f64>; 2],
    functionals: Interpolation2D,
    matrices: DeRhamMatrices,
    h1: SparseLuFactor,
    hcurl: SparseLuFactor,
    l2: SparseLuFactor,
    hcurl_scaling: SparseColMat<usize, f64>,
    l2_scaling: SparseColMat<usize, f64>,
}

impl DeRhamProjector2D {
    pub fn new(
        degrees: [usize; 2],
        dimensions: [usize; 2],
        knots: [ArrayView1<f64>; 2],
        options: &ProjectionOptions,
    ) -> Result<Self, SplineError> {
        let matrices = build_matrices_2d_h1_with_options(degrees, dimensions, knots, options)?;
        let functionals = Interpolation2D::with_options(degrees, dimensions, knots, options)?;

        let (h1, (hcurl, l2)) = rayon::join(
            || SparseLuFactor::factorize(&matrices.h1, "H1"),
            || {
                rayon::join(
                    || SparseLuFactor::factorize(&matrices.hcurl, "Hcurl"),
                    || SparseLuFactor::factorize(&matrices.l2, "L2"),
                )
            },
        );

        let owned = owned_knots(knots);
        let hcurl_scaling = scaling_matrix(&degrees, &dimensions, &owned, ScalingKind::Hcurl)?;
        let l2_scaling = scaling_matrix(&degrees, &dimensions, &owned, ScalingKind::L2)?;

        Ok(Self {
            degrees,
            knots: owned,
            functionals,
            matrices,
            h1: h1?,
            hcurl: hcurl?,
            l2: l2?,
            hcurl_scaling,
            l2_scaling,
        })
    }

    pub fn matrices(&self) -> &DeRhamMatrices {
        &self.matrices
    }

    pub fn factor(&self, space: DeRhamSpace) -> &SparseLuFactor {
        match space {
            DeRhamSpace::H1 => &self.h1,
            DeRhamSpace::Hcurl => &self.hcurl,
            DeRhamSpace::L2 => &self.l2,
        }
    }

    fn knot_views(&self) -> [ArrayView1<'_, f64>; 2] {
        [self.knots[0].view(), self.knots[1].view()]
    }

    /// Interpolation at the Greville grid.
    pub fn project_h1<F>(&self, f: F) -> Result<(Array1<f64>, TensorSplineRepr), SplineError>
    where
        F: Fn(f64, f64) -> f64 + Sync,
    {
        let rhs = to_array_h1(&self.functionals.interpolate_h1(f));
        let coefficients = self.h1.solve(&rhs)?;
        let repr = tck_h1(self.degrees, self.knot_views(), coefficients.view())?;
        Ok((coefficients, repr))
    }

    /// Edge histopolation; returns B-spline coefficients of both components.
    pub fn project_hcurl<G>(
        &self,
        g: G,
    ) -> Result<(Array1<f64>, [TensorSplineRepr; 2]), SplineError>
    where
        G: Fn(f64, f64) -> [f64; 2] + Sync,
    {
        let rhs = to_array_hcurl(&self.functionals.interpolate_hcurl(g));
        let solved = self.hcurl.solve(&rhs)?;
        let coefficients = sparse_matvec(&self.hcurl_scaling, &solved)?;
        let repr = tck_hcurl(self.degrees, self.knot_views(), coefficients.view())?;
        Ok((coefficients, repr))
    }

    /// Cell histopolation.
    pub fn project_l2<H>(&self, h: H) -> Result<(Array1<f64>, TensorSplineRepr), SplineError>
    where
        H: Fn(f64, f64) -> f64 + Sync,
    {
        let rhs = to_array_l2(&self.functionals.interpolate_l2(h));
        let solved = self.l2.solve(&rhs)?;
        let coefficients = sparse_matvec(&self.l2_scaling, &solved)?;
        let repr = tck_l2(self.degrees, self.knot_views(), coefficients.view())?;
        Ok((coefficients, repr))
    }
}
