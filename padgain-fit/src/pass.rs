//! The calibration pass: accumulate, estimate, average, compute gains.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use rayon::prelude::*;

use padgain_core::{
    CalibConfig, ChannelId, ClusterEvent, EventCuts, GainPolicy, GainTable, Geometry,
    GroupAverager, GroupId, SpectrumStore, INVALID_GAIN,
};

use crate::error::{Error, Result};
use crate::estimator::Estimator;

/// Phases of a calibration pass, in order. The pass only ever moves
/// forward; no phase retries or rolls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No event consumed yet.
    Idle,
    /// Consuming the event stream.
    Accumulating,
    /// Estimating per-channel responses.
    Estimating,
    /// Folding responses into group averages.
    Averaging,
    /// Computing final gains.
    GainComputing,
    /// Finished; the gain table has been produced.
    Done,
}

/// Cooperative cancellation flag shared with a running pass.
///
/// The pass checks the token between channels, never inside a fit, so
/// cancellation is prompt but leaves no partial state behind.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Counters describing what a pass saw and produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Events offered to the pass.
    pub events_seen: u64,
    /// Events that passed the quality cuts and were accumulated.
    pub events_accepted: u64,
    /// Channels in the geometry.
    pub channels_total: usize,
    /// Channels with a usable response estimate.
    pub channels_estimated: usize,
    /// Channels with a valid final gain.
    pub channels_valid: usize,
    /// Groups that received at least one response.
    pub groups_with_average: usize,
}

/// Everything a finished pass produces.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    /// Final per-channel gains, the sole product downstream consumes.
    pub gains: GainTable,
    /// Per-channel response estimates, for diagnostics.
    pub responses: BTreeMap<ChannelId, f64>,
    /// Per-group average responses, for diagnostics.
    pub group_averages: BTreeMap<GroupId, f64>,
    /// Run counters.
    pub summary: PassSummary,
}

/// One batch calibration over a finite event stream.
///
/// Each pass owns its spectrum store and averager, so independent
/// passes can run concurrently. Events for groups outside the geometry
/// are counted but not accumulated.
pub struct CalibrationPass {
    config: CalibConfig,
    geometry: Geometry,
    cuts: EventCuts,
    store: SpectrumStore,
    averager: GroupAverager,
    prior: Option<GainTable>,
    cancel: CancelToken,
    phase: Phase,
    events_seen: u64,
    events_accepted: u64,
}

impl CalibrationPass {
    /// Creates a pass over the given channel universe.
    ///
    /// # Errors
    /// Returns an error if the configuration is inconsistent.
    pub fn new(config: CalibConfig, geometry: Geometry) -> Result<Self> {
        config.validate()?;
        let cuts = EventCuts::from(&config);
        let store = SpectrumStore::new(config.histogram_bins);
        Ok(Self {
            config,
            geometry,
            cuts,
            store,
            averager: GroupAverager::new(),
            prior: None,
            cancel: CancelToken::new(),
            phase: Phase::Idle,
            events_seen: 0,
            events_accepted: 0,
        })
    }

    /// Enables update mode: event charges are scaled by the prior gain
    /// at intake and the prior composes into the final gain.
    #[must_use]
    pub fn with_prior_gains(mut self, prior: GainTable) -> Self {
        self.prior = Some(prior);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Feeds one event from the given sector's stream.
    ///
    /// Events failing the quality cuts are counted and dropped; in
    /// update mode the accumulated charge is scaled by the channel's
    /// prior gain first.
    ///
    /// # Errors
    /// Returns a phase error once estimation has started, or a core
    /// error if the histogram binning is invalid.
    pub fn accumulate(&mut self, group: GroupId, event: &ClusterEvent) -> Result<()> {
        match self.phase {
            Phase::Idle => self.phase = Phase::Accumulating,
            Phase::Accumulating => {}
            actual => {
                return Err(Error::Phase {
                    expected: Phase::Accumulating,
                    actual,
                })
            }
        }

        self.events_seen += 1;
        if !self.geometry.contains_group(group) {
            return Ok(());
        }
        if !self.cuts.accepts(event) {
            return Ok(());
        }

        let id = event.channel_in(group);
        let mut charge = event.charge;
        if let Some(prior) = &self.prior {
            charge *= prior.prior_or_unity(id);
        }

        let upper = self.config.histogram_upper(group);
        self.store.fill(id, charge, upper)?;
        self.events_accepted += 1;
        Ok(())
    }

    /// Runs the remaining phases and produces the gain table.
    ///
    /// Estimation runs channel-parallel; averaging completes for every
    /// group before any gain is computed.
    ///
    /// # Errors
    /// Returns a phase error if the pass already finished, or a
    /// cancellation error if the token was triggered.
    pub fn run(&mut self) -> Result<CalibrationOutcome> {
        match self.phase {
            Phase::Idle | Phase::Accumulating => {}
            actual => {
                return Err(Error::Phase {
                    expected: Phase::Accumulating,
                    actual,
                })
            }
        }

        self.phase = Phase::Estimating;
        debug!("estimating responses for {} channels", self.geometry.channel_count());
        let estimator = Estimator::from_config(&self.config);
        let channels: Vec<ChannelId> = self.geometry.channels().collect();
        let store = &self.store;
        let config = &self.config;
        let cancel = &self.cancel;
        let estimates: Vec<Option<f64>> = channels
            .par_iter()
            .map(|&id| {
                if cancel.is_cancelled() {
                    return None;
                }
                let hist = store.histogram(id)?;
                estimator.estimate(hist, config.search_threshold(id.group()))
            })
            .collect();
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let responses: BTreeMap<ChannelId, f64> = channels
            .iter()
            .zip(&estimates)
            .filter_map(|(&id, &estimate)| estimate.map(|value| (id, value)))
            .collect();

        self.phase = Phase::Averaging;
        debug!("averaging {} responses", responses.len());
        for (id, &value) in &responses {
            self.averager.add_value(id.group(), value);
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.phase = Phase::GainComputing;
        let policy = GainPolicy::new(
            self.config.min_acceptable_gain,
            self.config.max_acceptable_gain,
        );
        let mut gains = GainTable::new();
        let mut channels_valid = 0;
        for &id in &channels {
            let response = responses.get(&id).copied();
            let average = self.averager.average(id.group());
            let prior = self
                .prior
                .as_ref()
                .map_or(1.0, |table| table.prior_or_unity(id));
            let gain = policy.compute(response, average, prior);
            if (gain - INVALID_GAIN).abs() > f64::EPSILON {
                channels_valid += 1;
            }
            gains.insert(id, gain);
        }

        self.phase = Phase::Done;
        let group_averages: BTreeMap<GroupId, f64> = self
            .averager
            .groups()
            .filter_map(|(group, mean)| mean.mean().map(|value| (group, value)))
            .collect();
        let summary = PassSummary {
            events_seen: self.events_seen,
            events_accepted: self.events_accepted,
            channels_total: channels.len(),
            channels_estimated: responses.len(),
            channels_valid,
            groups_with_average: group_averages.len(),
        };
        if summary.channels_estimated == 0 {
            warn!(
                "no channel collected enough entries for a response estimate \
                 ({} events seen, {} accepted)",
                summary.events_seen, summary.events_accepted
            );
        }

        Ok(CalibrationOutcome {
            gains,
            responses,
            group_averages,
            summary,
        })
    }
}
