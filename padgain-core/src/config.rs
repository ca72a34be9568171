//! Calibration run configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::channel::GroupId;
use crate::error::{Error, Result};

/// Response estimation strategy for the whole run.
///
/// `Gaussian` fits the main decay peak directly; `Fermi` fits the
/// falling edge of the spectrum and should be chosen when the peak is
/// not cleanly separable from background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitFunction {
    /// Peak fit: the fitted mean is the response.
    #[default]
    Gaussian,
    /// Edge fit: the fitted edge location is the response.
    Fermi,
}

/// All options recognized by the calibration engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CalibConfig {
    /// Response estimation strategy.
    pub fit_function: FitFunction,
    /// Exclusive lower bound of the gain validity window.
    pub min_acceptable_gain: f64,
    /// Exclusive upper bound of the gain validity window.
    pub max_acceptable_gain: f64,
    /// Channels with fewer histogram entries get no response estimate.
    pub min_histogram_entries: u64,
    /// Number of bins per channel histogram.
    pub histogram_bins: usize,
    /// Histogram upper bound as a multiple of the group's search threshold.
    pub histogram_padding: f64,
    /// Smallest accepted cluster width in pads.
    pub min_pads: u16,
    /// Largest accepted cluster width in pads.
    pub max_pads: u16,
    /// Clusters earlier than this time slice are rejected.
    pub min_time_slice_number: u16,
    /// Smallest accepted cluster length in time slices.
    pub min_time_slices: u16,
    /// Largest accepted cluster length in time slices.
    pub max_time_slices: u16,
    /// Events pass the charge-quality cut when `max_adc` reaches this value.
    pub max_adc_cut: f64,
    /// Events pass the charge-quality cut when `charge` reaches this value.
    pub charge_cut: f64,
    /// Default lower bound for the peak search, in charge units.
    pub min_adc_peak_search: f64,
    /// Peak-search lower bound for the designated upstream sectors.
    pub upstream_min_adc_peak_search: f64,
    /// Chamber whose upstream-facing sectors use the raised threshold.
    pub upstream_chamber: u16,
    /// Sectors of `upstream_chamber` that use the raised threshold.
    pub upstream_sectors: Vec<u16>,
}

impl Default for CalibConfig {
    fn default() -> Self {
        Self {
            fit_function: FitFunction::Gaussian,
            min_acceptable_gain: 0.5,
            max_acceptable_gain: 2.5,
            min_histogram_entries: 100,
            histogram_bins: 100,
            histogram_padding: 4.0,
            min_pads: 1,
            max_pads: 8,
            min_time_slice_number: 10,
            min_time_slices: 1,
            max_time_slices: 20,
            max_adc_cut: 100.0,
            charge_cut: 500.0,
            min_adc_peak_search: 1000.0,
            upstream_min_adc_peak_search: 1600.0,
            upstream_chamber: 1,
            upstream_sectors: vec![1, 4],
        }
    }
}

impl CalibConfig {
    /// Returns the peak-search threshold for a group.
    ///
    /// Upstream sectors of the designated chamber see less drift
    /// attenuation, so their spectra sit higher and use the raised
    /// threshold.
    #[must_use]
    pub fn search_threshold(&self, group: GroupId) -> f64 {
        if group.chamber == self.upstream_chamber && self.upstream_sectors.contains(&group.sector)
        {
            self.upstream_min_adc_peak_search
        } else {
            self.min_adc_peak_search
        }
    }

    /// Returns the histogram upper bound for a group's channels.
    #[must_use]
    pub fn histogram_upper(&self, group: GroupId) -> f64 {
        self.search_threshold(group) * self.histogram_padding
    }

    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    /// Returns an error describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        if self.histogram_bins == 0 {
            return Err(Error::Config("histogram_bins must be positive".into()));
        }
        if !self.histogram_padding.is_finite() || self.histogram_padding <= 0.0 {
            return Err(Error::Config("histogram_padding must be positive".into()));
        }
        if self.min_acceptable_gain >= self.max_acceptable_gain {
            return Err(Error::Config(format!(
                "gain window is empty: ({}, {})",
                self.min_acceptable_gain, self.max_acceptable_gain
            )));
        }
        if self.min_pads > self.max_pads {
            return Err(Error::Config(format!(
                "pad cut window is empty: [{}, {}]",
                self.min_pads, self.max_pads
            )));
        }
        if self.min_time_slices > self.max_time_slices {
            return Err(Error::Config(format!(
                "time slice cut window is empty: [{}, {}]",
                self.min_time_slices, self.max_time_slices
            )));
        }
        if !self.min_adc_peak_search.is_finite() || self.min_adc_peak_search <= 0.0 {
            return Err(Error::Config("min_adc_peak_search must be positive".into()));
        }
        if !self.upstream_min_adc_peak_search.is_finite()
            || self.upstream_min_adc_peak_search <= 0.0
        {
            return Err(Error::Config(
                "upstream_min_adc_peak_search must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CalibConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_selection() {
        let config = CalibConfig::default();
        assert_relative_eq!(config.search_threshold(GroupId::new(1, 1)), 1600.0);
        assert_relative_eq!(config.search_threshold(GroupId::new(1, 4)), 1600.0);
        assert_relative_eq!(config.search_threshold(GroupId::new(1, 2)), 1000.0);
        assert_relative_eq!(config.search_threshold(GroupId::new(2, 1)), 1000.0);
    }

    #[test]
    fn test_histogram_upper_scales_threshold() {
        let config = CalibConfig::default();
        assert_relative_eq!(config.histogram_upper(GroupId::new(2, 1)), 4000.0);
        assert_relative_eq!(config.histogram_upper(GroupId::new(1, 4)), 6400.0);
    }

    #[test]
    fn test_validation_rejects_empty_windows() {
        let mut config = CalibConfig::default();
        config.min_acceptable_gain = 3.0;
        assert!(config.validate().is_err());

        let mut config = CalibConfig::default();
        config.min_pads = 10;
        config.max_pads = 2;
        assert!(config.validate().is_err());

        let mut config = CalibConfig::default();
        config.histogram_bins = 0;
        assert!(config.validate().is_err());
    }
}
