//! Define Errors

use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, TraceMinError>;

/// Master Error type of this crate
#[derive(Debug, Error)]
pub enum TraceMinError {
    /// Caller handed the solver something it cannot work with
    #[error("Invalid input: {reason}")]
    BadInput { reason: String },

    /// A computed trace stopped being a finite number
    #[error("Divergence detected: trace = {trace}")]
    Divergence { trace: f64 },

    /// The line minimizer could not bracket a minimum within tolerance
    #[error("Could not bracket a line minimum")]
    BracketFailure,

    /// The iteration limit was exhausted before the trace settled
    #[error("No convergence after {iterations} iterations")]
    NonConvergence { iterations: usize },

    /// A Gram block lost positive-definiteness, so its Cholesky failed
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,
}

impl TraceMinError {
    pub(crate) fn bad_input(reason: impl Into<String>) -> Self {
        TraceMinError::BadInput {
            reason: reason.into(),
        }
    }
}
