//! Event quality cuts.

use crate::config::CalibConfig;
use crate::event::ClusterEvent;

/// Quality cuts applied to every event before accumulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventCuts {
    /// Smallest accepted cluster width in pads.
    pub min_pads: u16,
    /// Largest accepted cluster width in pads.
    pub max_pads: u16,
    /// Smallest accepted cluster length in time slices.
    pub min_time_slices: u16,
    /// Largest accepted cluster length in time slices.
    pub max_time_slices: u16,
    /// Clusters earlier than this time slice are rejected.
    pub min_time_slice_number: u16,
    /// Charge-quality cut on the total cluster charge.
    pub charge_cut: f64,
    /// Charge-quality cut on the cluster's largest ADC sample.
    pub max_adc_cut: f64,
}

impl EventCuts {
    /// Returns true if the event passes all cuts.
    ///
    /// An event passes the charge-quality stage if either its charge or
    /// its largest ADC sample is strong enough.
    #[must_use]
    pub fn accepts(&self, event: &ClusterEvent) -> bool {
        if event.charge <= 0.0 {
            return false;
        }
        if event.n_pads < self.min_pads || event.n_pads > self.max_pads {
            return false;
        }
        if event.n_time_slices < self.min_time_slices
            || event.n_time_slices > self.max_time_slices
        {
            return false;
        }
        if event.time_slice < self.min_time_slice_number {
            return false;
        }
        if event.charge < self.charge_cut && event.max_adc < self.max_adc_cut {
            return false;
        }
        true
    }
}

impl From<&CalibConfig> for EventCuts {
    fn from(config: &CalibConfig) -> Self {
        Self {
            min_pads: config.min_pads,
            max_pads: config.max_pads,
            min_time_slices: config.min_time_slices,
            max_time_slices: config.max_time_slices,
            min_time_slice_number: config.min_time_slice_number,
            charge_cut: config.charge_cut,
            max_adc_cut: config.max_adc_cut,
        }
    }
}
