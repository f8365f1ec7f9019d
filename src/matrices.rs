//! Banded system matrices of a 1D spline space.
//!
//! Every builder assembles straight into sparse triplets; entry `(i, j)` is
//! only stored when the supports of the two functions involved overlap, so
//! `|i - j| <= degree` up to the row offset of the evaluation grid.

use crate::basis::{BsplineScratch, basis_funs, validate_knots_for_degree};
use crate::error::SplineError;
use crate::linalg::sparse::{nnz, sparse_from_triplets};
use crate::quadrature::{QuadratureGrid, eval_on_grid_splines_ders};
use crate::types::ProjectionOptions;
use faer::sparse::{SparseColMat, Triplet};
use ndarray::{Array2, ArrayView1};

pub(crate) fn check_space(
    degree: usize,
    dimension: usize,
    knots: ArrayView1<f64>,
) -> Result<(), SplineError> {
    SplineError::check_len("knot vector", dimension + degree + 1, knots.len())?;
    validate_knots_for_degree(knots, degree)?;
    Ok(())
}

/// `M[i, j] = B_j(x_i)`.
pub fn collocation_matrix(
    degree: usize,
    dimension: usize,
    knots: ArrayView1<f64>,
    points: ArrayView1<f64>,
    options: &ProjectionOptions,
) -> Result<SparseColMat<usize, f64>, SplineError> {
    check_space(degree, dimension, knots)?;
    let mut scratch = BsplineScratch::new(degree);
    let mut local = vec![0.0; degree + 1];
    let mut triplets = Vec::with_capacity(points.len() * (degree + 1));
    for (i, &x) in points.iter().enumerate() {
        let start = basis_funs(x, degree, knots, &mut local, &mut scratch);
        for (offset, &value) in local.iter().enumerate() {
            if value.abs() > options.drop_tolerance {
                triplets.push(Triplet::new(i, start + offset, value));
            }
        }
    }
    let matrix = sparse_from_triplets(points.len(), dimension, &triplets)?;
    log::debug!(
        "collocation matrix: {}x{}, nnz={}",
        matrix.nrows(),
        matrix.ncols(),
        nnz(&matrix)
    );
    Ok(matrix)
}

#[inline]
fn cumulative_basis(local: &[f64], start: usize, j: usize) -> f64 {
    if j < start {
        0.0
    } else {
        let upto = (j - start).min(local.len() - 1);
        local[..=upto].iter().sum()
    }
}

/// Histopolation matrix on consecutive Greville intervals.
///
/// `points` are the `dimension` Greville points `g_i` of the space. Entry
/// `H[i, j]` is the integral over `[g_i, g_{i+1}]` of the `j`-th M-spline
/// of degree `degree - 1` on the reduced knots, evaluated exactly through
/// `∫ D_j = Σ_{k <= j} (B_k(g_i) - B_k(g_{i+1}))`. The result is
/// `(dimension - 1) x (dimension - 1)`.
pub fn histopolation_matrix(
    degree: usize,
    dimension: usize,
    knots: ArrayView1<f64>,
    points: ArrayView1<f64>,
    options: &ProjectionOptions,
) -> Result<SparseColMat<usize, f64>, SplineError> {
    check_space(degree, dimension, knots)?;
    SplineError::check_len("histopolation points", dimension, points.len())?;
    if degree == 0 {
        return Err(SplineError::InvalidInput(
            "histopolation needs a space of degree at least 1".to_string(),
        ));
    }

    let m = dimension - 1;
    let mut scratch = BsplineScratch::new(degree);
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    let mut triplets = Vec::with_capacity(m * (degree + 2));
    for i in 0..m {
        let a = basis_funs(points[i], degree, knots, &mut left, &mut scratch);
        let b = basis_funs(points[i + 1], degree, knots, &mut right, &mut scratch);
        let first = a.min(b);
        let last = (a.max(b) + degree).min(m - 1);
        for j in first..=last {
            let value = cumulative_basis(&left, a, j) - cumulative_basis(&right, b, j);
            if value.abs() > options.drop_tolerance {
                triplets.push(Triplet::new(i, j, value));
            }
        }
    }
    let matrix = sparse_from_triplets(m, m, &triplets)?;
    log::debug!("histopolation matrix: {m}x{m}, nnz={}", nnz(&matrix));
    Ok(matrix)
}

/// `Mass[i, j] = ∫ B_i B_j`, by Gauss–Legendre quadrature on the knot cells.
pub fn mass_matrix(
    degree: usize,
    dimension: usize,
    knots: ArrayView1<f64>,
    options: &ProjectionOptions,
) -> Result<SparseColMat<usize, f64>, SplineError> {
    check_space(degree, dimension, knots)?;
    let grid = QuadratureGrid::from_knots(knots, options.quadrature_points_for(degree))?;
    let on_grid = eval_on_grid_splines_ders(degree, knots, &grid, 0)?;

    // band[i, degree + j - i] accumulates entry (i, j)
    let width = 2 * degree + 1;
    let mut band = Array2::<f64>::zeros((dimension, width));
    for ie in 0..grid.ncells() {
        let start = on_grid.spans[ie];
        for il in 0..=degree {
            for jl in 0..=degree {
                let mut value = 0.0;
                for iq in 0..grid.num_points() {
                    value += grid.weights[[ie, iq]]
                        * on_grid.values[[ie, il, 0, iq]]
                        * on_grid.values[[ie, jl, 0, iq]];
                }
                band[[start + il, degree + jl - il]] += value;
            }
        }
    }

    let mut triplets = Vec::with_capacity(dimension * width);
    for i in 0..dimension {
        for k in 0..width {
            let value = band[[i, k]];
            if value.abs() > options.drop_tolerance {
                triplets.push(Triplet::new(i, i + k - degree, value));
            }
        }
    }
    let matrix = sparse_from_triplets(dimension, dimension, &triplets)?;
    log::debug!("mass matrix: {dimension}x{dimension}, nnz={}", nnz(&matrix));
    Ok(matrix)
}
