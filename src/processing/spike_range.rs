//! Outlier-robust value range for choosing display limits.
//!
//! A full sort of a large grid is too expensive to run whenever a colour
//! scale needs refreshing. Instead the grid is sampled at a fixed stride so
//! that at most `max_samples` cells are visited, and two short candidate
//! lists track the smallest and the largest values seen. The boundary of each
//! list is the estimate: everything beyond it is treated as a spike.
//!
//! The result is approximate. Its quality depends on how many candidates the
//! percentile buys once the stride is applied.

use serde::{Deserialize, Serialize};

use crate::config::SpikeConfig;
use crate::state::grid_buffer::is_blank;

/// Estimated `[min, max]` with the tails trimmed.
///
/// `degenerate` is set when there were no non-blank cells to look at; the
/// range is then `(0, 0)`. If fewer cells were sampled than the candidate
/// lists hold, a bound can stay at its infinite seed, so callers should clamp
/// before display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeRange {
    pub min: f64,
    pub max: f64,
    pub degenerate: bool,
}

impl SpikeRange {
    fn degenerate() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            degenerate: true,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

/// Fixed-length list of the most extreme values seen so far on one side.
///
/// `Low` keeps the smallest values; its boundary is the largest entry. `High`
/// keeps the largest values; its boundary is the smallest entry.
struct CandidateList {
    values: Vec<f64>,
    boundary: f64,
    boundary_at: usize,
    keep_low: bool,
}

impl CandidateList {
    fn new(len: usize, keep_low: bool) -> Self {
        let seed = if keep_low { f64::INFINITY } else { f64::NEG_INFINITY };
        Self {
            values: vec![seed; len],
            boundary: seed,
            boundary_at: 0,
            keep_low,
        }
    }

    fn offer(&mut self, value: f64) {
        let beats_boundary = if self.keep_low {
            value < self.boundary
        } else {
            value > self.boundary
        };
        if !beats_boundary {
            return;
        }
        self.values[self.boundary_at] = value;

        let mut boundary = self.values[0];
        let mut boundary_at = 0;
        for (i, &v) in self.values.iter().enumerate().skip(1) {
            let further_in = if self.keep_low { v > boundary } else { v < boundary };
            if further_in {
                boundary = v;
                boundary_at = i;
            }
        }
        self.boundary = boundary;
        self.boundary_at = boundary_at;
    }
}

/// Exact range of the non-blank samples.
fn exact_range(samples: &[f64]) -> SpikeRange {
    let (min, max) = samples
        .iter()
        .copied()
        .filter(|v| !is_blank(*v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    SpikeRange {
        min,
        max,
        degenerate: false,
    }
}

/// Estimate the range of `samples` with `percentile` of the values dropped
/// from each tail. Percentiles below 0 are treated as 0; values of 1 or more
/// are held just below 1.
pub fn estimate(samples: &[f64], percentile: f64, max_samples: usize) -> SpikeRange {
    let total = samples.len();
    let contributing = samples.iter().filter(|v| !is_blank(**v)).count();
    if contributing == 0 {
        return SpikeRange::degenerate();
    }

    let per = if percentile.is_nan() {
        0.0
    } else {
        percentile.clamp(0.0, 1.0 - f64::EPSILON)
    };
    let blank_ratio = total as f64 / contributing as f64;
    // blanks dilute the tail fraction, so scale it down and widen the sample budget
    let per = per / blank_ratio;
    let budget = max_samples.max(1) as f64 * blank_ratio;
    let skip = (total as f64 / budget).max(1.0);

    let list_len = (total as f64 * per / skip) as usize;
    if list_len == 0 {
        return exact_range(samples);
    }

    let mut low = CandidateList::new(list_len, true);
    let mut high = CandidateList::new(list_len, false);

    let mut step = 0usize;
    loop {
        let j = (step as f64 * skip) as usize;
        if j >= total {
            break;
        }
        let v = samples[j];
        if !is_blank(v) {
            low.offer(v);
            high.offer(v);
        }
        step += 1;
    }

    tracing::debug!(total, contributing, skip, list_len, "estimated spike-insensitive range");

    SpikeRange {
        min: low.boundary,
        max: high.boundary,
        degenerate: false,
    }
}

/// [`estimate`] with the percentile and sample cap taken from `config`.
pub fn estimate_with(samples: &[f64], config: &SpikeConfig) -> SpikeRange {
    estimate(samples, config.percentile, config.max_samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_blank_is_degenerate() {
        let range = estimate(&[f64::NAN, f64::NAN], 0.1, 50_000);
        assert!(range.degenerate);
        assert_eq!((range.min, range.max), (0.0, 0.0));
    }

    #[test]
    fn test_empty_is_degenerate() {
        assert!(estimate(&[], 0.1, 50_000).degenerate);
    }

    #[test]
    fn test_zero_percentile_is_exact() {
        let samples = [3.0, -2.0, 8.5, 0.0, 1.0];
        let range = estimate(&samples, 0.0, 50_000);
        assert!(!range.degenerate);
        assert_eq!((range.min, range.max), (-2.0, 8.5));
    }

    #[test]
    fn test_negative_percentile_clamped() {
        let samples = [1.0, 100.0, 2.0];
        assert_eq!(estimate(&samples, -0.5, 50_000), estimate(&samples, 0.0, 50_000));
    }

    #[test]
    fn test_trims_spikes() {
        // 0..1000 with two spikes; 1% tails keep 10 candidates per side
        let mut samples: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        samples[10] = -1.0e9;
        samples[500] = 1.0e9;
        let range = estimate(&samples, 0.01, 50_000);
        assert_eq!(range.min, 8.0);
        assert_eq!(range.max, 991.0);
        assert!(range.is_finite());
    }

    #[test]
    fn test_ignores_blank_cells() {
        let mut samples: Vec<f64> = (0..200).map(|i| i as f64).collect();
        samples.extend(std::iter::repeat(f64::NAN).take(200));
        samples.push(f64::INFINITY);
        let range = estimate(&samples, 0.0, 50_000);
        assert_eq!((range.min, range.max), (0.0, 199.0));
    }

    #[test]
    fn test_sample_cap_bounds_stride() {
        let samples: Vec<f64> = (0..100_000).map(|i| i as f64).collect();
        // skip = 10, so 10% tails hold 1000 candidates of the 10_000 sampled cells
        let range = estimate(&samples, 0.1, 10_000);
        assert_eq!(range.min, 9_990.0);
        assert_eq!(range.max, 90_000.0);
    }

    #[test]
    fn test_stride_over_blanks_leaves_seed() {
        // stride 2 only ever lands on the blank cells
        let samples = [f64::NAN, 1.0, f64::NAN, 2.0, f64::NAN, 3.0, f64::NAN, 4.0];
        let range = estimate(&samples, 0.9, 2);
        assert!(!range.degenerate);
        assert!(!range.is_finite());
    }

    #[test]
    fn test_config_defaults() {
        let samples: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let range = estimate_with(&samples, &SpikeConfig::default());
        assert_eq!((range.min, range.max), (0.0, 9.0));
    }
}
