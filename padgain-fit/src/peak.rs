//! Peak search and fit windowing over charge spectra.
#![allow(clippy::cast_precision_loss)]

use padgain_core::ChargeHistogram;

/// Location of the spectrum maximum above the search threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSearch {
    /// Bin index of the maximum.
    pub bin: usize,
    /// Charge at the bin center.
    pub center: f64,
    /// Bin content at the maximum.
    pub count: f64,
}

/// Scans bins with center at or above `min_search` and returns the
/// first bin of maximal nonzero content.
///
/// When no bin qualifies the result is the degenerate peak at position
/// 0 with content 0; callers must tolerate it, and the estimators do by
/// falling back to the peak position itself.
#[must_use]
pub fn find_peak(hist: &ChargeHistogram, min_search: f64) -> PeakSearch {
    let mut peak = PeakSearch {
        bin: 0,
        center: 0.0,
        count: 0.0,
    };
    for bin in 0..hist.n_bins() {
        let center = hist.center(bin);
        if center < min_search {
            continue;
        }
        let count = hist.count(bin) as f64;
        if count > peak.count {
            peak = PeakSearch { bin, center, count };
        }
    }
    peak
}

/// Fit bounds around a peak, from the half-maximum crossings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitWindow {
    /// Lower fit bound in charge units.
    pub lower: f64,
    /// Upper fit bound in charge units.
    pub upper: f64,
}

/// Walks outward from the peak bin to the first bin on each side whose
/// content drops below half the peak content; those bin centers bound
/// the fit.
///
/// A side with no such bin keeps the bound at 0. Bin zero is never
/// examined on the way down, so a peak sitting at the histogram edge
/// also keeps the lower bound at 0.
#[must_use]
pub fn half_max_window(hist: &ChargeHistogram, peak: &PeakSearch) -> FitWindow {
    let half = 0.5 * peak.count;

    let mut lower = 0.0;
    for bin in (1..=peak.bin).rev() {
        if (hist.count(bin) as f64) < half {
            lower = hist.center(bin);
            break;
        }
    }

    let mut upper = 0.0;
    for bin in peak.bin..hist.n_bins() {
        if (hist.count(bin) as f64) < half {
            upper = hist.center(bin);
            break;
        }
    }

    FitWindow { lower, upper }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hist_with_counts(counts: &[(f64, usize)], upper: f64, bins: usize) -> ChargeHistogram {
        let mut hist = ChargeHistogram::new(bins, upper).unwrap();
        for &(charge, n) in counts {
            for _ in 0..n {
                hist.fill(charge);
            }
        }
        hist
    }

    #[test]
    fn test_peak_ignores_bins_below_threshold() {
        // Big population at 1000, small one at 3000; threshold at 1500
        // must pick the small one.
        let hist = hist_with_counts(&[(1000.0, 180), (3000.0, 20)], 6000.0, 100);
        let peak = find_peak(&hist, 1500.0);
        assert_relative_eq!(peak.center, 3030.0);
        assert_relative_eq!(peak.count, 20.0);
    }

    #[test]
    fn test_peak_without_threshold_picks_global_maximum() {
        let hist = hist_with_counts(&[(1000.0, 180), (3000.0, 20)], 6000.0, 100);
        let peak = find_peak(&hist, 0.0);
        assert_relative_eq!(peak.center, 990.0);
        assert_relative_eq!(peak.count, 180.0);
    }

    #[test]
    fn test_degenerate_spectrum() {
        // Everything below the threshold: the peak stays degenerate.
        let hist = hist_with_counts(&[(500.0, 300)], 6000.0, 100);
        let peak = find_peak(&hist, 1500.0);
        assert_eq!(peak.bin, 0);
        assert_relative_eq!(peak.center, 0.0);
        assert_relative_eq!(peak.count, 0.0);
    }

    #[test]
    fn test_window_brackets_the_peak() {
        // Bell-ish shape: 10, 40, 100, 40, 10 around 3000, bin width 60.
        let hist = hist_with_counts(
            &[
                (2880.0, 10),
                (2940.0, 40),
                (3000.0, 100),
                (3060.0, 40),
                (3120.0, 10),
            ],
            6000.0,
            100,
        );
        let peak = find_peak(&hist, 1500.0);
        assert_relative_eq!(peak.center, 3030.0);
        let window = half_max_window(&hist, &peak);
        assert_relative_eq!(window.lower, 2970.0);
        assert_relative_eq!(window.upper, 3090.0);
    }

    #[test]
    fn test_window_side_without_crossing_stays_at_zero() {
        // A plateau running to the end of the histogram never drops
        // below half maximum on the high side.
        let mut hist = ChargeHistogram::new(10, 1000.0).unwrap();
        for bin in 5..10 {
            let center = (bin as f64 + 0.5) * 100.0;
            for _ in 0..50 {
                hist.fill(center);
            }
        }
        let peak = find_peak(&hist, 0.0);
        let window = half_max_window(&hist, &peak);
        assert_relative_eq!(window.upper, 0.0);
        assert!(window.lower > 0.0);
    }
}
