//! padgain-fit: Response estimation and the calibration pass.
//!
//! This crate turns accumulated charge spectra into per-channel gain
//! corrections: peak search and fit windowing, the Gaussian and Fermi
//! fit strategies on a bounded L-BFGS engine, and the phase-ordered
//! calibration pass that drives a whole batch.
//!

pub mod error;
pub mod estimator;
pub mod model;
pub mod optimizer;
pub mod pass;
pub mod peak;

pub use error::{Error, Result};
pub use estimator::{Estimator, FermiEdgeEstimator, GaussianPeakEstimator};
pub use optimizer::{FitConfig, FitOutcome, LbfgsFitter, Objective};
pub use pass::{CalibrationOutcome, CalibrationPass, CancelToken, PassSummary, Phase};
pub use peak::{find_peak, half_max_window, FitWindow, PeakSearch};
