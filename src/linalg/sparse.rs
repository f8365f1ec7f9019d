use crate::linalg::faer_ndarray::{FaerArrayView, FaerColView, mat_column_to_array, mat_to_array};
use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::Lu as SparseLu;
use faer::sparse::{SparseColMat, Triplet};
use ndarray::{Array1, Array2};
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// Entries below this magnitude are treated as structural zeros by default.
pub const DROP_TOL: f64 = 1e-14;

#[derive(Error, Debug)]
pub enum LinalgError {
    #[error("Failed to build sparse matrix: {0}")]
    SparseCreation(String),

    #[error("Matrix must be square to factorize, got {rows}x{cols}.")]
    NotSquare { rows: usize, cols: usize },

    #[error("Right-hand side has {found} rows but the {label} system has {expected}.")]
    RhsLength {
        label: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Sparse LU factorization of the {0} system failed; the matrix is singular.")]
    Singular(&'static str),

    #[error("Vector has {found} entries but the matrix has {expected} columns.")]
    VectorLength { expected: usize, found: usize },
}

/// Builds a CSC matrix from `(row, col, value)` triplets, summing duplicates.
pub fn sparse_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: &[Triplet<usize, usize, f64>],
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    SparseColMat::try_new_from_triplets(nrows, ncols, triplets)
        .map_err(|e| LinalgError::SparseCreation(format!("{e:?}")))
}

pub fn dense_to_sparse(
    matrix: &Array2<f64>,
    tol: f64,
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let nrows = matrix.nrows();
    let ncols = matrix.ncols();
    let mut triplets = Vec::new();
    for row in 0..nrows {
        for col in 0..ncols {
            let value = matrix[[row, col]];
            if value.abs() > tol {
                triplets.push(Triplet::new(row, col, value));
            }
        }
    }
    sparse_from_triplets(nrows, ncols, &triplets)
}

/// Calls `f(row, col, value)` for every stored entry.
pub fn for_each_entry<F>(matrix: &SparseColMat<usize, f64>, mut f: F)
where
    F: FnMut(usize, usize, f64),
{
    let (symbolic, values) = matrix.parts();
    let col_ptr = symbolic.col_ptr();
    let row_idx = symbolic.row_idx();
    for col in 0..matrix.ncols() {
        for idx in col_ptr[col]..col_ptr[col + 1] {
            f(row_idx[idx], col, values[idx]);
        }
    }
}

pub fn nnz(matrix: &SparseColMat<usize, f64>) -> usize {
    let (symbolic, _) = matrix.parts();
    let col_ptr = symbolic.col_ptr();
    col_ptr[matrix.ncols()] - col_ptr[0]
}

pub fn sparse_to_dense(matrix: &SparseColMat<usize, f64>) -> Array2<f64> {
    let mut dense = Array2::<f64>::zeros((matrix.nrows(), matrix.ncols()));
    for_each_entry(matrix, |row, col, value| dense[[row, col]] += value);
    dense
}

/// `A x`, rejecting a vector whose length differs from the column count.
pub fn sparse_matvec(
    matrix: &SparseColMat<usize, f64>,
    vector: &Array1<f64>,
) -> Result<Array1<f64>, LinalgError> {
    if vector.len() != matrix.ncols() {
        return Err(LinalgError::VectorLength {
            expected: matrix.ncols(),
            found: vector.len(),
        });
    }
    let mut out = Array1::<f64>::zeros(matrix.nrows());
    let (symbolic, values) = matrix.parts();
    let col_ptr = symbolic.col_ptr();
    let row_idx = symbolic.row_idx();
    for col in 0..matrix.ncols() {
        let x = vector[col];
        if x == 0.0 {
            continue;
        }
        for idx in col_ptr[col]..col_ptr[col + 1] {
            out[row_idx[idx]] += values[idx] * x;
        }
    }
    Ok(out)
}

pub fn sparse_diag(diagonal: &[f64]) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let n = diagonal.len();
    let triplets: Vec<_> = diagonal
        .iter()
        .enumerate()
        .map(|(i, &v)| Triplet::new(i, i, v))
        .collect();
    sparse_from_triplets(n, n, &triplets)
}

pub fn sparse_identity(n: usize) -> Result<SparseColMat<usize, f64>, LinalgError> {
    sparse_diag(&vec![1.0; n])
}

/// Sparse Kronecker product `A ⊗ B`.
///
/// Only products of stored entries are formed, so the result has
/// `nnz(A) * nnz(B)` entries and never goes through a dense intermediate.
pub fn sparse_kron(
    a: &SparseColMat<usize, f64>,
    b: &SparseColMat<usize, f64>,
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let (b_rows, b_cols) = (b.nrows(), b.ncols());
    let mut b_entries = Vec::with_capacity(nnz(b));
    for_each_entry(b, |row, col, value| b_entries.push((row, col, value)));

    let mut triplets = Vec::with_capacity(nnz(a) * b_entries.len());
    for_each_entry(a, |i, j, a_val| {
        if a_val == 0.0 {
            return;
        }
        for &(k, l, b_val) in &b_entries {
            triplets.push(Triplet::new(i * b_rows + k, j * b_cols + l, a_val * b_val));
        }
    });
    sparse_from_triplets(a.nrows() * b_rows, a.ncols() * b_cols, &triplets)
}

/// Kronecker product of a list of factors, left to right.
pub fn sparse_kron_all(
    factors: &[SparseColMat<usize, f64>],
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let Some((first, rest)) = factors.split_first() else {
        return Err(LinalgError::SparseCreation(
            "Kronecker product of an empty list of factors".to_string(),
        ));
    };
    let mut acc = first.clone();
    for factor in rest {
        acc = sparse_kron(&acc, factor)?;
    }
    Ok(acc)
}

/// Block-diagonal composition; off-diagonal blocks are structurally empty.
pub fn sparse_block_diag(
    blocks: &[SparseColMat<usize, f64>],
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let nrows: usize = blocks.iter().map(|b| b.nrows()).sum();
    let ncols: usize = blocks.iter().map(|b| b.ncols()).sum();
    let mut triplets = Vec::with_capacity(blocks.iter().map(nnz).sum());
    let (mut row_offset, mut col_offset) = (0usize, 0usize);
    for block in blocks {
        for_each_entry(block, |row, col, value| {
            triplets.push(Triplet::new(row + row_offset, col + col_offset, value));
        });
        row_offset += block.nrows();
        col_offset += block.ncols();
    }
    sparse_from_triplets(nrows, ncols, &triplets)
}

/// A sparse LU factorization, computed once and reused for every right-hand side.
pub struct SparseLuFactor {
    factor: SparseLu<usize, f64>,
    n: usize,
    label: &'static str,
}

impl SparseLuFactor {
    pub fn factorize(
        matrix: &SparseColMat<usize, f64>,
        label: &'static str,
    ) -> Result<Self, LinalgError> {
        let (rows, cols) = (matrix.nrows(), matrix.ncols());
        if rows != cols {
            return Err(LinalgError::NotSquare { rows, cols });
        }
        log::debug!(
            "factorizing {label} system: n={rows}, nnz={}",
            nnz(matrix)
        );
        // faer panics on a zero pivot during numeric factorization
        let factor = match std::panic::catch_unwind(AssertUnwindSafe(|| matrix.as_ref().sp_lu())) {
            Ok(Ok(factor)) => factor,
            Ok(Err(_)) | Err(_) => {
                log::warn!("sparse LU of the {label} system hit a zero pivot");
                return Err(LinalgError::Singular(label));
            }
        };
        Ok(Self {
            factor,
            n: rows,
            label,
        })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn solve(&self, rhs: &Array1<f64>) -> Result<Array1<f64>, LinalgError> {
        self.check_rows(rhs.len())?;
        let rhs_view = FaerColView::new(rhs);
        let solved = self.factor.solve(rhs_view.as_ref());
        let out = mat_column_to_array(&solved);
        if out.iter().any(|v| !v.is_finite()) {
            return Err(LinalgError::Singular(self.label));
        }
        Ok(out)
    }

    /// Solves for every column of `rhs` with the same factorization.
    pub fn solve_columns(&self, rhs: &Array2<f64>) -> Result<Array2<f64>, LinalgError> {
        self.check_rows(rhs.nrows())?;
        let rhs_view = FaerArrayView::new(rhs);
        let solved = self.factor.solve(rhs_view.as_ref());
        let out = mat_to_array(solved.as_ref());
        if out.iter().any(|v| !v.is_finite()) {
            return Err(LinalgError::Singular(self.label));
        }
        Ok(out)
    }

    fn check_rows(&self, found: usize) -> Result<(), LinalgError> {
        if found != self.n {
            return Err(LinalgError::RhsLength {
                label: self.label,
                expected: self.n,
                found,
            });
        }
        Ok(())
    }
}

/// Factorizes `matrix` and solves a single right-hand side.
pub fn solve(
    matrix: &SparseColMat<usize, f64>,
    rhs: &Array1<f64>,
) -> Result<Array1<f64>, LinalgError> {
    SparseLuFactor::factorize(matrix, "system")?.solve(rhs)
}
