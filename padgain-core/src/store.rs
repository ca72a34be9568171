//! Per-channel spectrum storage.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::channel::ChannelId;
use crate::error::Result;
use crate::histogram::ChargeHistogram;

/// Owns one charge histogram per channel.
///
/// Histograms are created lazily on first fill with the upper bound the
/// caller derives for the channel's group. Iteration order over
/// channels is the channel ordering, so repeated runs visit channels
/// identically.
#[derive(Debug, Clone)]
pub struct SpectrumStore {
    bins: usize,
    histograms: BTreeMap<ChannelId, ChargeHistogram>,
}

impl SpectrumStore {
    /// Creates an empty store whose histograms will use `bins` bins.
    #[must_use]
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            histograms: BTreeMap::new(),
        }
    }

    /// Records one charge for `id`, creating the channel's histogram on
    /// first use with range `[0, upper)`.
    ///
    /// # Errors
    /// Returns an error if a histogram must be created and the binning
    /// is invalid.
    pub fn fill(&mut self, id: ChannelId, charge: f64, upper: f64) -> Result<()> {
        let histogram = match self.histograms.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(ChargeHistogram::new(self.bins, upper)?),
        };
        histogram.fill(charge);
        Ok(())
    }

    /// Returns the total number of fills recorded for `id`.
    #[must_use]
    pub fn entry_count(&self, id: ChannelId) -> u64 {
        self.histograms
            .get(&id)
            .map_or(0, ChargeHistogram::entries)
    }

    /// Returns the histogram of `id`, if any event ever reached it.
    #[must_use]
    pub fn histogram(&self, id: ChannelId) -> Option<&ChargeHistogram> {
        self.histograms.get(&id)
    }

    /// Iterates over the channels that have a histogram, in channel order.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.histograms.keys().copied()
    }

    /// Returns the number of channels with a histogram.
    #[must_use]
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    /// Returns true if no channel has seen an event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_creation_and_counts() {
        let mut store = SpectrumStore::new(50);
        let id = ChannelId::new(1, 2, 3, 4);
        assert_eq!(store.entry_count(id), 0);
        assert!(store.histogram(id).is_none());

        store.fill(id, 10.0, 1000.0).unwrap();
        store.fill(id, 20.0, 1000.0).unwrap();
        assert_eq!(store.entry_count(id), 2);
        let hist = store.histogram(id).unwrap();
        assert_eq!(hist.n_bins(), 50);
        assert_eq!(hist.entries(), 2);
    }

    #[test]
    fn test_bounds_fixed_at_creation() {
        let mut store = SpectrumStore::new(10);
        let id = ChannelId::new(1, 1, 1, 1);
        store.fill(id, 10.0, 100.0).unwrap();
        // A different upper bound on a later fill does not rebin.
        store.fill(id, 10.0, 9999.0).unwrap();
        assert!((store.histogram(id).unwrap().upper() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_channel_iteration_is_ordered() {
        let mut store = SpectrumStore::new(10);
        store.fill(ChannelId::new(2, 1, 1, 1), 1.0, 100.0).unwrap();
        store.fill(ChannelId::new(1, 1, 1, 2), 1.0, 100.0).unwrap();
        store.fill(ChannelId::new(1, 1, 1, 1), 1.0, 100.0).unwrap();
        let channels: Vec<ChannelId> = store.channels().collect();
        assert_eq!(
            channels,
            vec![
                ChannelId::new(1, 1, 1, 1),
                ChannelId::new(1, 1, 1, 2),
                ChannelId::new(2, 1, 1, 1),
            ]
        );
    }

    #[test]
    fn test_invalid_upper_is_rejected() {
        let mut store = SpectrumStore::new(10);
        assert!(store.fill(ChannelId::new(1, 1, 1, 1), 1.0, 0.0).is_err());
    }
}
