use crate::basis::BasisError;
use crate::linalg::sparse::LinalgError;
use thiserror::Error;

/// Errors surfaced by spaces, projectors and the 2D assembly.
///
/// Every error is local to the computation that produced it.
#[derive(Error, Debug)]
pub enum SplineError {
    #[error("Not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Basis(#[from] BasisError),

    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl SplineError {
    pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), Self> {
        if expected != found {
            return Err(SplineError::DimensionMismatch {
                what,
                expected,
                found,
            });
        }
        Ok(())
    }
}
