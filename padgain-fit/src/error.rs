//! Error types for padgain-fit.

use thiserror::Error;

use crate::pass::Phase;

/// Result type alias for fit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fit and calibration-pass error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] padgain_core::Error),

    /// Optimizer setup or execution error.
    #[error("optimizer error: {0}")]
    Optimizer(String),

    /// An operation was attempted in the wrong pass phase.
    #[error("calibration pass is in phase {actual:?}, expected {expected:?}")]
    Phase {
        /// Phase the operation requires.
        expected: Phase,
        /// Phase the pass is actually in.
        actual: Phase,
    },

    /// The pass was cancelled through its cancellation token.
    #[error("calibration pass cancelled")]
    Cancelled,
}
