//! Error types for padgain-core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid histogram binning.
    #[error("invalid histogram binning: {bins} bins over (0, {upper})")]
    InvalidBinning {
        /// Requested bin count.
        bins: usize,
        /// Requested upper bound.
        upper: f64,
    },
}
