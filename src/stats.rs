//! Running statistics over calibrated pixel values.
use std::ops::AddAssign;

use serde_derive::*;

/// Count, extremes and mean of a stream of values. `NaN`
/// values are counted separately and do not enter the
/// other statistics.
///
/// Accumulate with `+= value` and merge partial results
/// with `+= &other`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(into = "StatsSummary")]
pub struct Stats {
    count: usize,
    nan_count: usize,
    min: f64,
    max: f64,
    sum: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            nan_count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.,
        }
    }
}

impl Stats {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn nan_count(&self) -> usize {
        self.nan_count
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then(|| self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then(|| self.max)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

impl AddAssign<f64> for Stats {
    fn add_assign(&mut self, val: f64) {
        if val.is_nan() {
            self.nan_count += 1;
            return;
        }
        self.count += 1;
        self.min = self.min.min(val);
        self.max = self.max.max(val);
        self.sum += val;
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, other: &Stats) {
        self.count += other.count;
        self.nan_count += other.nan_count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
    }
}

#[derive(Serialize)]
struct StatsSummary {
    count: usize,
    nan_count: usize,
    min: Option<f64>,
    max: Option<f64>,
    mean: Option<f64>,
}

impl From<Stats> for StatsSummary {
    fn from(s: Stats) -> Self {
        StatsSummary {
            count: s.count(),
            nan_count: s.nan_count(),
            min: s.min(),
            max: s.max(),
            mean: s.mean(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_merges() {
        let mut a = Stats::default();
        a += 1.5;
        a += f64::NAN;
        a += -2.5;

        let mut b = Stats::default();
        b += 4.;

        a += &b;
        assert_eq!(a.count(), 3);
        assert_eq!(a.nan_count(), 1);
        assert_eq!(a.min(), Some(-2.5));
        assert_eq!(a.max(), Some(4.));
        assert_eq!(a.mean(), Some(1.));
    }

    #[test]
    fn empty_stats_serialize_without_extremes() -> anyhow::Result<()> {
        let json = serde_json::to_value(Stats::default())?;
        assert_eq!(
            json,
            serde_json::json!({
                "count": 0,
                "nan_count": 0,
                "min": null,
                "max": null,
                "mean": null,
            })
        );
        Ok(())
    }
}
