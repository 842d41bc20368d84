//! Error types for galilean.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalileanError {
    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    #[error("Insufficient ensemble: need at least 2 walkers, found {size}")]
    InsufficientEnsemble { size: usize },

    #[error("Invalid fit index: {0}")]
    InvalidFitIndex(String),

    #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model evaluation failed: {0}")]
    Evaluation(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GalileanError {
    /// Wrap a collaborator failure, keeping it as the error source.
    pub fn evaluation<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Evaluation(err.into())
    }
}

pub type Result<T> = std::result::Result<T, GalileanError>;

/// Fail with [`GalileanError::DimensionMismatch`] unless `found == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(GalileanError::DimensionMismatch {
            what,
            expected,
            found,
        })
    }
}
