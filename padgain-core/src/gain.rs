//! Gain computation, validity clipping, and the output gain table.

use std::collections::BTreeMap;

use crate::channel::ChannelId;

/// Sentinel marking a channel excluded from downstream charge weighting.
pub const INVALID_GAIN: f64 = -1.0;

/// Turns channel responses into clipped multiplicative gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainPolicy {
    /// Exclusive lower bound of the validity window.
    pub min_acceptable: f64,
    /// Exclusive upper bound of the validity window.
    pub max_acceptable: f64,
}

impl GainPolicy {
    /// Creates a policy with the given validity window.
    #[must_use]
    pub fn new(min_acceptable: f64, max_acceptable: f64) -> Self {
        Self {
            min_acceptable,
            max_acceptable,
        }
    }

    /// Computes the final gain for one channel.
    ///
    /// The raw gain is `prior * group_average / response`; pass a prior
    /// of 1.0 outside update mode. An undefined response or group
    /// average yields the invalid sentinel, as does any raw gain that
    /// is non-finite or outside the open interval
    /// `(min_acceptable, max_acceptable)`.
    #[must_use]
    pub fn compute(
        &self,
        response: Option<f64>,
        group_average: Option<f64>,
        prior: f64,
    ) -> f64 {
        let (Some(response), Some(average)) = (response, group_average) else {
            return INVALID_GAIN;
        };
        let raw = prior * average / response;
        if !raw.is_finite() || raw <= self.min_acceptable || raw >= self.max_acceptable {
            return INVALID_GAIN;
        }
        raw
    }
}

/// Per-channel gain values, ordered by channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainTable {
    entries: BTreeMap<ChannelId, f64>,
}

impl GainTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gain of `id`.
    pub fn insert(&mut self, id: ChannelId, gain: f64) {
        self.entries.insert(id, gain);
    }

    /// Returns the gain of `id`, if present.
    #[must_use]
    pub fn get(&self, id: ChannelId) -> Option<f64> {
        self.entries.get(&id).copied()
    }

    /// Returns the prior gain to apply to a channel's charges.
    ///
    /// Channels that are absent, carry the invalid sentinel, or carry a
    /// non-positive value are treated as uncorrected (gain 1.0).
    #[must_use]
    pub fn prior_or_unity(&self, id: ChannelId) -> f64 {
        match self.get(id) {
            Some(gain) if gain > 0.0 => gain,
            _ => 1.0,
        }
    }

    /// Iterates over `(channel, gain)` pairs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, f64)> + '_ {
        self.entries.iter().map(|(&id, &gain)| (id, gain))
    }

    /// Returns the number of channels in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ChannelId, f64)> for GainTable {
    fn from_iter<I: IntoIterator<Item = (ChannelId, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn policy() -> GainPolicy {
        GainPolicy::new(0.5, 2.5)
    }

    #[test]
    fn test_gain_passes_through_unchanged() {
        let gain = policy().compute(Some(1000.0), Some(1020.0), 1.0);
        assert_relative_eq!(gain, 1.02);
    }

    #[test]
    fn test_out_of_window_is_clipped() {
        assert_relative_eq!(policy().compute(Some(1000.0), Some(3100.0), 1.0), INVALID_GAIN);
        assert_relative_eq!(policy().compute(Some(3100.0), Some(1000.0), 1.0), INVALID_GAIN);
    }

    #[test]
    fn test_window_bounds_are_exclusive() {
        assert_relative_eq!(policy().compute(Some(1000.0), Some(500.0), 1.0), INVALID_GAIN);
        assert_relative_eq!(policy().compute(Some(1000.0), Some(2500.0), 1.0), INVALID_GAIN);
    }

    #[test]
    fn test_undefined_inputs_are_invalid() {
        assert_relative_eq!(policy().compute(None, Some(1000.0), 1.0), INVALID_GAIN);
        assert_relative_eq!(policy().compute(Some(1000.0), None, 1.0), INVALID_GAIN);
    }

    #[test]
    fn test_zero_response_is_invalid_not_a_crash() {
        assert_relative_eq!(policy().compute(Some(0.0), Some(1000.0), 1.0), INVALID_GAIN);
    }

    #[test]
    fn test_prior_composes() {
        let gain = policy().compute(Some(1000.0), Some(1000.0), 1.2);
        assert_relative_eq!(gain, 1.2);
    }

    #[test]
    fn test_prior_or_unity() {
        let mut table = GainTable::new();
        let known = ChannelId::new(1, 1, 1, 1);
        let excluded = ChannelId::new(1, 1, 1, 2);
        table.insert(known, 1.1);
        table.insert(excluded, INVALID_GAIN);
        assert_relative_eq!(table.prior_or_unity(known), 1.1);
        assert_relative_eq!(table.prior_or_unity(excluded), 1.0);
        assert_relative_eq!(table.prior_or_unity(ChannelId::new(9, 9, 9, 9)), 1.0);
    }
}
