//! Response estimation strategies.
//!
//! Both strategies reduce a channel's charge spectrum to one scalar:
//! the peak fit takes the mean of a Gaussian restricted to the
//! half-maximum window, the edge fit takes the location parameter of a
//! Fermi-type function fitted to the falling edge. Fits that cannot be
//! performed or do not converge fall back to the unfitted peak
//! position, so a channel with enough entries always gets a response
//! and a fit problem never aborts the run.
#![allow(clippy::cast_precision_loss)]

use padgain_core::{CalibConfig, ChargeHistogram, FitFunction};

use crate::model::{fermi, gaussian};
use crate::optimizer::{LbfgsFitter, Objective};
use crate::peak::{find_peak, half_max_window, PeakSearch};

// Weighted residuals need this many usable bins to constrain a fit.
const MIN_FIT_POINTS: usize = 3;

// Half-maximum window width to Gaussian sigma, via FWHM.
const FWHM_TO_SIGMA: f64 = 2.354_820_045;

/// Chi-square of a Gaussian against binned counts, weighted by the
/// Poisson variance of each bin. Parameters: `[mean, sigma, amplitude]`.
struct GaussianObjective {
    points: Vec<(f64, f64)>,
}

impl Objective for GaussianObjective {
    fn eval(&self, params: &[f64]) -> f64 {
        let (mean, sigma, amplitude) = (params[0], params[1], params[2]);
        if sigma.abs() < f64::EPSILON {
            return 1e300;
        }
        self.points
            .iter()
            .map(|&(x, y)| {
                let residual = y - gaussian(x, mean, sigma, amplitude);
                residual * residual / y
            })
            .sum()
    }
}

/// Chi-square of a Fermi edge with fixed amplitude. Parameters:
/// `[slope, edge]`.
struct FermiObjective {
    points: Vec<(f64, f64)>,
    amplitude: f64,
}

impl Objective for FermiObjective {
    fn eval(&self, params: &[f64]) -> f64 {
        let (slope, edge) = (params[0], params[1]);
        self.points
            .iter()
            .map(|&(x, y)| {
                let residual = y - fermi(x, self.amplitude, slope, edge);
                residual * residual / y
            })
            .sum()
    }
}

fn fit_points(
    hist: &ChargeHistogram,
    lower: f64,
    upper: f64,
) -> Vec<(f64, f64)> {
    hist.bins()
        .filter(|&(center, count)| center >= lower && center <= upper && count > 0)
        .map(|(center, count)| (center, count as f64))
        .collect()
}

fn accept_or_fallback(fitted: f64, hist: &ChargeHistogram, peak: &PeakSearch) -> f64 {
    if fitted.is_finite() && fitted >= 0.0 && fitted <= hist.upper() {
        fitted
    } else {
        peak.center
    }
}

/// Peak-fit strategy: Gaussian mean over the half-maximum window.
#[derive(Debug, Clone, Default)]
pub struct GaussianPeakEstimator {
    fitter: LbfgsFitter,
}

impl GaussianPeakEstimator {
    /// Creates the estimator with default solver settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimates the response of one spectrum.
    #[must_use]
    pub fn estimate(&self, hist: &ChargeHistogram, min_search: f64) -> f64 {
        let peak = find_peak(hist, min_search);
        let window = half_max_window(hist, &peak);
        let points = fit_points(hist, window.lower, window.upper);
        if points.len() < MIN_FIT_POINTS {
            return peak.center;
        }

        let sigma_seed = ((window.upper - window.lower) / FWHM_TO_SIGMA).max(hist.width());
        let init = [peak.center, sigma_seed, peak.count.max(1.0)];
        let bounds = [(f64::NEG_INFINITY, f64::INFINITY); 3];

        match self.fitter.minimize(&GaussianObjective { points }, &init, &bounds) {
            Ok(fit) if fit.converged => accept_or_fallback(fit.params[0], hist, &peak),
            _ => peak.center,
        }
    }
}

/// Edge-fit strategy: Fermi edge location from the peak to the end of
/// the spectrum.
#[derive(Debug, Clone, Default)]
pub struct FermiEdgeEstimator {
    fitter: LbfgsFitter,
}

impl FermiEdgeEstimator {
    /// Creates the estimator with default solver settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimates the response of one spectrum.
    #[must_use]
    pub fn estimate(&self, hist: &ChargeHistogram, min_search: f64) -> f64 {
        let peak = find_peak(hist, min_search);
        let points = fit_points(hist, peak.center, hist.last_center());
        if points.len() < MIN_FIT_POINTS {
            return peak.center;
        }

        let objective = FermiObjective {
            points,
            amplitude: peak.count,
        };
        let init = [0.01, peak.center];
        let bounds = [(1e-4, 1.0), (f64::NEG_INFINITY, f64::INFINITY)];

        match self.fitter.minimize(&objective, &init, &bounds) {
            Ok(fit) if fit.converged => accept_or_fallback(fit.params[1], hist, &peak),
            _ => peak.center,
        }
    }
}

enum Strategy {
    Gaussian(GaussianPeakEstimator),
    Fermi(FermiEdgeEstimator),
}

/// Configured response estimator for one run.
pub struct Estimator {
    strategy: Strategy,
    min_entries: u64,
}

impl Estimator {
    /// Builds the estimator selected by the configuration.
    #[must_use]
    pub fn from_config(config: &CalibConfig) -> Self {
        let strategy = match config.fit_function {
            FitFunction::Gaussian => Strategy::Gaussian(GaussianPeakEstimator::new()),
            FitFunction::Fermi => Strategy::Fermi(FermiEdgeEstimator::new()),
        };
        Self {
            strategy,
            min_entries: config.min_histogram_entries,
        }
    }

    /// Returns the strategy name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.strategy {
            Strategy::Gaussian(_) => "Gaussian",
            Strategy::Fermi(_) => "Fermi",
        }
    }

    /// Estimates the response of one channel spectrum, or `None` when
    /// the spectrum has too few entries to be trusted.
    #[must_use]
    pub fn estimate(&self, hist: &ChargeHistogram, min_search: f64) -> Option<f64> {
        if hist.entries() < self.min_entries {
            return None;
        }
        Some(match &self.strategy {
            Strategy::Gaussian(estimator) => estimator.estimate(hist, min_search),
            Strategy::Fermi(estimator) => estimator.estimate(hist, min_search),
        })
    }
}
