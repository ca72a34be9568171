//! Calibration-source cluster events.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, GroupId};

/// One calibration-source decay observation, attributed to one channel.
///
/// The chamber and sector are not part of the event itself; they come
/// from the context the event was read in (one event file holds the
/// clusters of a single sector).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterEvent {
    /// Total cluster charge in ADC-equivalent units.
    pub charge: f64,
    /// Largest single-sample ADC value in the cluster.
    pub max_adc: f64,
    /// Time slice of the cluster maximum.
    pub time_slice: u16,
    /// Number of pixels in the cluster.
    pub n_pixels: u16,
    /// Number of time slices spanned by the cluster.
    pub n_time_slices: u16,
    /// Number of pads spanned by the cluster.
    pub n_pads: u16,
    /// Padrow of the cluster maximum (1-based).
    pub padrow: u16,
    /// Pad of the cluster maximum (1-based).
    pub pad: u16,
}

impl ClusterEvent {
    /// Returns the full channel address given the sector context.
    #[inline]
    #[must_use]
    pub fn channel_in(&self, group: GroupId) -> ChannelId {
        ChannelId::new(group.chamber, group.sector, self.padrow, self.pad)
    }
}
