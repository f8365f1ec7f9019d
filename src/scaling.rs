//! Diagonal scalings between M-spline and B-spline coefficients.
//!
//! The M-spline `D_i = (p + 1) / (t_{i+p+1} - t_i) B_i` has unit integral.
//! Histopolation solves for coefficients in the M-spline basis, so a scaling
//! matrix converts them to the B-spline coefficients of the reduced space.

use crate::basis::reduce_knots;
use crate::error::SplineError;
use crate::linalg::sparse::{sparse_block_diag, sparse_diag, sparse_identity, sparse_kron_all};
use crate::matrices::check_space;
use crate::types::ScalingKind;
use faer::sparse::SparseColMat;
use ndarray::{Array1, ArrayView1};

/// Diagonal `(p + 1) / (T[i + p + 1] - T[i])`, `i < n`.
pub fn scaling_matrix_1d(
    degree: usize,
    dimension: usize,
    knots: ArrayView1<f64>,
) -> Result<SparseColMat<usize, f64>, SplineError> {
    check_space(degree, dimension, knots)?;
    let order = (degree + 1) as f64;
    let mut diagonal = Vec::with_capacity(dimension);
    for i in 0..dimension {
        let width = knots[i + degree + 1] - knots[i];
        if width <= 0.0 {
            return Err(SplineError::InvalidInput(format!(
                "basis function {i} has an empty support"
            )));
        }
        diagonal.push(order / width);
    }
    Ok(sparse_diag(&diagonal)?)
}

/// `(degree - 1, dimension - 1, T[1:-1])`.
fn reduced(
    degree: usize,
    dimension: usize,
    knots: ArrayView1<f64>,
) -> Result<(usize, usize, Array1<f64>), SplineError> {
    if degree == 0 || dimension < 2 {
        return Err(SplineError::InvalidInput(format!(
            "cannot reduce a space of degree {degree} and dimension {dimension}"
        )));
    }
    Ok((degree - 1, dimension - 1, reduce_knots(knots)?))
}

/// Tensor-product scaling for one space of the de Rham sequence.
///
/// * [`ScalingKind::Tensor`]: `S_0 ⊗ S_1 ⊗ ...` of the given spaces.
/// * [`ScalingKind::Hcurl`]: component `i` scales the reduced direction `i`
///   and leaves the other directions unscaled; components are stacked
///   block-diagonally. The non-reduced direction is deliberately left
///   alone: scaling it too would stop gradients of H1 interpolants from
///   being reproduced exactly.
/// * [`ScalingKind::L2`]: every direction reduced, then `Tensor`.
pub fn scaling_matrix(
    degrees: &[usize],
    dimensions: &[usize],
    knots: &[Array1<f64>],
    kind: ScalingKind,
) -> Result<SparseColMat<usize, f64>, SplineError> {
    let dim = degrees.len();
    SplineError::check_len("dimensions per direction", dim, dimensions.len())?;
    SplineError::check_len("knot vectors per direction", dim, knots.len())?;
    if dim == 0 {
        return Err(SplineError::InvalidInput(
            "scaling matrix needs at least one direction".to_string(),
        ));
    }

    match kind {
        ScalingKind::Tensor => {
            let factors = (0..dim)
                .map(|d| scaling_matrix_1d(degrees[d], dimensions[d], knots[d].view()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sparse_kron_all(&factors)?)
        }
        ScalingKind::Hcurl => {
            let mut blocks = Vec::with_capacity(dim);
            for component in 0..dim {
                let mut factors = Vec::with_capacity(dim);
                for d in 0..dim {
                    if d == component {
                        let (p, n, t) = reduced(degrees[d], dimensions[d], knots[d].view())?;
                        factors.push(scaling_matrix_1d(p, n, t.view())?);
                    } else {
                        check_space(degrees[d], dimensions[d], knots[d].view())?;
                        factors.push(sparse_identity(dimensions[d])?);
                    }
                }
                blocks.push(sparse_kron_all(&factors)?);
            }
            Ok(sparse_block_diag(&blocks)?)
        }
        ScalingKind::L2 => {
            let mut p = Vec::with_capacity(dim);
            let mut n = Vec::with_capacity(dim);
            let mut t = Vec::with_capacity(dim);
            for d in 0..dim {
                let (pd, nd, td) = reduced(degrees[d], dimensions[d], knots[d].view())?;
                p.push(pd);
                n.push(nd);
                t.push(td);
            }
            scaling_matrix(&p, &n, &t, ScalingKind::Tensor)
        }
    }
}
