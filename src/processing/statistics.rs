use serde::{Deserialize, Serialize};

use crate::state::grid_buffer::is_blank;

/// Placeholder for `minpos` when samples exist but none of them is positive.
pub const NO_POSITIVE_VALUE: f64 = 1.0e300;

/// Names under which matrix statistics are published to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatName {
    Min,
    Max,
    Mean,
    Sigma,
    Rms,
    Sum,
    SumSquared,
    Ns,
    MinPos,
}

impl StatName {
    pub const ALL: [StatName; 9] = [
        StatName::Max,
        StatName::Min,
        StatName::Mean,
        StatName::Sigma,
        StatName::Rms,
        StatName::Ns,
        StatName::Sum,
        StatName::SumSquared,
        StatName::MinPos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatName::Min => "min",
            StatName::Max => "max",
            StatName::Mean => "mean",
            StatName::Sigma => "sigma",
            StatName::Rms => "rms",
            StatName::Sum => "sum",
            StatName::SumSquared => "sumsquared",
            StatName::Ns => "ns",
            StatName::MinPos => "minpos",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatName::Min => "Min",
            StatName::Max => "Max",
            StatName::Mean => "Mean",
            StatName::Sigma => "Sigma",
            StatName::Rms => "Rms",
            StatName::Sum => "Sum",
            StatName::SumSquared => "SumSquared",
            StatName::Ns => "NS",
            StatName::MinPos => "MinPos",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

/// Aggregate statistics over the non-blank cells of a matrix.
///
/// With fewer than two contributing cells `mean` is 0, `sigma` is
/// `max - min` (0 when nothing contributes) and `rms` is
/// `sqrt(sum_squared)`; none of them are true sample moments in that case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixStats {
    /// Number of contributing (non-blank) cells.
    pub ns: usize,
    /// Number of addressable cells the pass looked at.
    pub cell_count: usize,
    pub sum: f64,
    pub sum_squared: f64,
    pub min: f64,
    pub max: f64,
    pub min_positive: f64,
    pub mean: f64,
    pub sigma: f64,
    pub rms: f64,
}

impl Default for MatrixStats {
    fn default() -> Self {
        Self {
            ns: 0,
            cell_count: 0,
            sum: 0.0,
            sum_squared: 0.0,
            min: f64::NAN,
            max: f64::NAN,
            min_positive: f64::NAN,
            mean: 0.0,
            sigma: 0.0,
            rms: 0.0,
        }
    }
}

impl MatrixStats {
    /// Single pass over `samples`, skipping blank cells.
    pub fn compute(samples: &[f64]) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_squared = 0.0;
        let mut min = f64::NAN;
        let mut max = f64::NAN;
        let mut min_positive: Option<f64> = None;

        for &v in samples.iter().filter(|v| !is_blank(**v)) {
            if count == 0 {
                min = v;
                max = v;
            } else {
                min = min.min(v);
                max = max.max(v);
            }
            if v > 0.0 && min_positive.map_or(true, |p| v < p) {
                min_positive = Some(v);
            }
            sum += v;
            sum_squared += v * v;
            count += 1;
        }

        let min_positive = match (count, min_positive) {
            (0, _) => f64::NAN,
            (_, Some(p)) => p,
            (_, None) => NO_POSITIVE_VALUE,
        };

        let mut stats = Self {
            ns: count,
            cell_count: samples.len(),
            sum,
            sum_squared,
            min,
            max,
            min_positive,
            ..Self::default()
        };
        stats.derive_moments();
        stats
    }

    fn derive_moments(&mut self) {
        if self.ns >= 2 {
            let n = self.ns as f64;
            self.mean = self.sum / n;
            // clamp rounding noise that would make the variance slightly negative
            let variance = ((self.sum_squared - self.sum * self.sum / n) / (n - 1.0)).max(0.0);
            self.sigma = variance.sqrt();
            self.rms = (self.sum_squared / n).sqrt();
        } else {
            self.mean = 0.0;
            // max and min are NaN with no contributing cells
            self.sigma = if self.ns == 0 { 0.0 } else { self.max - self.min };
            self.rms = self.sum_squared.sqrt();
        }
    }

    pub fn get(&self, name: StatName) -> f64 {
        match name {
            StatName::Min => self.min,
            StatName::Max => self.max,
            StatName::Mean => self.mean,
            StatName::Sigma => self.sigma,
            StatName::Rms => self.rms,
            StatName::Sum => self.sum,
            StatName::SumSquared => self.sum_squared,
            StatName::Ns => self.ns as f64,
            StatName::MinPos => self.min_positive,
        }
    }

    /// Lookup by published name (`"min"`, `"sumsquared"`, ...).
    pub fn scalar(&self, name: &str) -> Option<f64> {
        StatName::from_name(name).map(|n| self.get(n))
    }

    /// Format as a multi-line report string.
    pub fn report(&self, label: &str) -> String {
        let mut out = format!("{label}:\n");
        for name in StatName::ALL {
            out.push_str(&format!("  {}: {:.3}\n", name.label(), self.get(name)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_two_spikes_in_zeros() {
        let mut samples = vec![0.0; 16];
        samples[5] = 5.0;
        samples[10] = -3.0;
        let stats = MatrixStats::compute(&samples);
        assert_eq!(stats.ns, 16);
        assert_eq!(stats.min, -3.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.sum - 2.0).abs() < 1e-12);
        assert!((stats.sum_squared - 34.0).abs() < 1e-12);
        assert!((stats.mean - 0.125).abs() < 1e-12);
        assert_eq!(stats.min_positive, 5.0);
    }

    #[test]
    fn test_single_value() {
        let stats = MatrixStats::compute(&[-4.0, f64::NAN]);
        assert_eq!(stats.ns, 1);
        assert_eq!(stats.cell_count, 2);
        assert_eq!(stats.min, -4.0);
        assert_eq!(stats.max, -4.0);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.sigma, 0.0);
        assert!((stats.rms - 4.0).abs() < 1e-12);
        assert_eq!(stats.min_positive, NO_POSITIVE_VALUE);
    }

    #[test]
    fn test_all_blank() {
        let stats = MatrixStats::compute(&[f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        assert_eq!(stats.ns, 0);
        assert_eq!(stats.sigma, 0.0);
        assert_eq!(stats.rms, 0.0);
        assert!(stats.min.is_nan());
        assert!(stats.max.is_nan());
        assert!(stats.min_positive.is_nan());
        assert_eq!(stats.sum, 0.0);
        assert_eq!(stats.sum_squared, 0.0);
    }

    #[test]
    fn test_sample_sigma_and_rms() {
        let stats = MatrixStats::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        // sample (n - 1) standard deviation
        assert!((stats.sigma - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!((stats.rms - (232.0f64 / 8.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.min_positive, 2.0);
    }

    #[test]
    fn test_min_positive_above_placeholder() {
        let stats = MatrixStats::compute(&[3e300, -1.0, 2e300]);
        assert_eq!(stats.min_positive, 2e300);
        let stats = MatrixStats::compute(&[5e300]);
        assert_eq!(stats.min_positive, 5e300);
    }

    #[test]
    fn test_min_positive_skips_non_positive() {
        let stats = MatrixStats::compute(&[-1.0, 0.0, 3.0, 0.5, -7.0]);
        assert_eq!(stats.min_positive, 0.5);
        assert_eq!(stats.min, -7.0);
    }

    #[test]
    fn test_named_lookup() {
        let stats = MatrixStats::compute(&[1.0, 2.0, 3.0]);
        assert_eq!(stats.scalar("max"), Some(3.0));
        assert_eq!(stats.scalar("ns"), Some(3.0));
        assert_eq!(stats.scalar("sumsquared"), Some(14.0));
        assert_eq!(stats.scalar("median"), None);
        for name in StatName::ALL {
            assert_eq!(StatName::from_name(name.as_str()), Some(name));
        }
    }

    #[test]
    fn test_report_lists_every_scalar() {
        let report = MatrixStats::compute(&[1.0, 2.0]).report("M1");
        assert!(report.starts_with("M1:\n"));
        assert!(report.contains("  Max: 2.000\n"));
        assert_eq!(report.lines().count(), 1 + StatName::ALL.len());
    }
}
