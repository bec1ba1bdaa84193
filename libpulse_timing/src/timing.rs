use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::run::ChannelId;

/// Statistics of the arrival-time difference t_a - t_b of a channel pair, over the
/// events where both times are defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    pub channel_a: ChannelId,
    pub channel_b: ChannelId,
    pub count: usize,
    pub mean: f64,
    /// Population variance of the difference; NaN with fewer than two events
    pub variance: f64,
}

impl PairStats {
    pub fn sigma(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn key(&self) -> (ChannelId, ChannelId) {
        (self.channel_a, self.channel_b)
    }
}

/// Statistics of the absolute arrival time of one channel, relative to the scope
/// trigger. The spread is an estimate of the channel jitter independent of the pair
/// decomposition, assuming the trigger itself is sharp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStats {
    pub channel: ChannelId,
    pub count: usize,
    pub mean: f64,
    /// Population variance; NaN with fewer than two events
    pub variance: f64,
}

impl TimeStats {
    pub fn sigma(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Mean and population variance, NaN when there are too few values for either
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let count = values.len();
    let mean = if count == 0 {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / count as f64
    };
    let variance = if count < 2 {
        f64::NAN
    } else {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64
    };
    (mean, variance)
}

/// Every unordered pair of channels, (a, b) with a < b, in lexicographic order
pub fn channel_pairs(channels: &[ChannelId]) -> Vec<(ChannelId, ChannelId)> {
    let mut sorted = channels.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut pairs = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in sorted[i + 1..].iter() {
            pairs.push((*a, *b));
        }
    }
    pairs
}

/// Difference statistics of two per-event time arrays. NaN entries in either array
/// exclude that event.
pub fn pair_stats(
    channel_a: ChannelId,
    times_a: ArrayView1<'_, f64>,
    channel_b: ChannelId,
    times_b: ArrayView1<'_, f64>,
) -> PairStats {
    let deltas: Vec<f64> = times_a
        .iter()
        .zip(times_b.iter())
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| a - b)
        .collect();
    let (mean, variance) = mean_and_variance(&deltas);
    PairStats {
        channel_a,
        channel_b,
        count: deltas.len(),
        mean,
        variance,
    }
}

/// Trigger-referenced time statistics of one channel, skipping undefined times
pub fn time_stats(channel: ChannelId, times: ArrayView1<'_, f64>) -> TimeStats {
    let defined: Vec<f64> = times.iter().copied().filter(|t| !t.is_nan()).collect();
    let (mean, variance) = mean_and_variance(&defined);
    TimeStats {
        channel,
        count: defined.len(),
        mean,
        variance,
    }
}

/// Statistics for every channel pair of a run
pub fn all_pair_stats(times: &BTreeMap<ChannelId, Array1<f64>>) -> Vec<PairStats> {
    let channels: Vec<ChannelId> = times.keys().copied().collect();
    channel_pairs(&channels)
        .into_iter()
        .map(|(a, b)| pair_stats(a, times[&a].view(), b, times[&b].view()))
        .collect()
}

/// The pair variance map consumed by the jitter solver
pub fn pair_variances(stats: &[PairStats]) -> BTreeMap<(ChannelId, ChannelId), f64> {
    stats.iter().map(|s| (s.key(), s.variance)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_channel_pairs() {
        assert_eq!(
            channel_pairs(&[4, 2, 1, 3]),
            vec![(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)]
        );
        assert!(channel_pairs(&[1]).is_empty());
    }

    #[test]
    fn test_masks_undefined_times() {
        let a = array![1.0, 2.0, f64::NAN, 4.0, 5.0];
        let b = array![0.0, 0.0, 0.0, f64::NAN, 1.0];
        let stats = pair_stats(1, a.view(), 2, b.view());
        // deltas: 1, 2, 4
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, 7.0 / 3.0);
        assert_relative_eq!(stats.variance, 14.0 / 9.0, max_relative = 1e-12);
    }

    #[test]
    fn test_too_few_events() {
        let a = array![1.0, f64::NAN];
        let b = array![0.5, 0.0];
        let stats = pair_stats(1, a.view(), 3, b.view());
        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean, 0.5);
        assert!(stats.variance.is_nan());
    }

    #[test]
    fn test_time_stats_masks_undefined() {
        let t = array![10.0, f64::NAN, 12.0, 14.0];
        let stats = time_stats(2, t.view());
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, 12.0);
        assert_relative_eq!(stats.variance, 8.0 / 3.0, max_relative = 1e-12);

        let empty = time_stats(2, array![f64::NAN].view());
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
        assert!(empty.sigma().is_nan());
    }

    #[test]
    fn test_all_pairs() {
        let times = BTreeMap::from([
            (1, array![0.0, 1.0, 2.0]),
            (2, array![0.0, 0.0, 0.0]),
            (3, array![1.0, 1.0, f64::NAN]),
        ]);
        let stats = all_pair_stats(&times);
        assert_eq!(stats.len(), 3);
        let variances = pair_variances(&stats);
        assert_relative_eq!(variances[&(1, 2)], 2.0 / 3.0, max_relative = 1e-12);
        assert_relative_eq!(variances[&(1, 3)], 0.25, max_relative = 1e-12);
        assert_eq!(variances[&(2, 3)], 0.0);
    }
}
