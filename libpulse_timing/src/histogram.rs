use serde::{Deserialize, Serialize};

/// Fixed-width histogram over [lower, upper].
///
/// Values outside the range (and NaNs) are not counted. The upper edge is included
/// in the last bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub lower: f64,
    pub upper: f64,
    pub counts: Vec<u64>,
}

impl Histogram {
    pub fn new(bins: usize, lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            counts: vec![0; bins],
        }
    }

    pub fn from_values<I: IntoIterator<Item = f64>>(
        values: I,
        bins: usize,
        lower: f64,
        upper: f64,
    ) -> Self {
        let mut hist = Self::new(bins, lower, upper);
        for value in values {
            hist.fill(value);
        }
        hist
    }

    pub fn fill(&mut self, value: f64) {
        let bins = self.counts.len();
        if bins == 0 || !(self.upper > self.lower) || !(value >= self.lower && value <= self.upper)
        {
            return;
        }
        let index = ((value - self.lower) / (self.upper - self.lower) * bins as f64) as usize;
        self.counts[index.min(bins - 1)] += 1;
    }

    pub fn bin_width(&self) -> f64 {
        (self.upper - self.lower) / self.counts.len() as f64
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.lower + (bin as f64 + 0.5) * self.bin_width()
    }

    pub fn entries(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Index of the fullest bin (the first one on ties), None if nothing was counted
    pub fn peak_bin(&self) -> Option<usize> {
        if self.entries() == 0 {
            return None;
        }
        let mut best = 0;
        for (bin, count) in self.counts.iter().enumerate() {
            if *count > self.counts[best] {
                best = bin;
            }
        }
        Some(best)
    }

    /// Center of the fullest bin; for an amplitude spectrum this is the Landau MPV estimate
    pub fn peak_position(&self) -> Option<f64> {
        self.peak_bin().map(|bin| self.bin_center(bin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fill_and_peak() {
        let values = [0.01, 0.12, 0.13, 0.14, 0.31, 0.5, 0.6, -0.1, f64::NAN];
        let hist = Histogram::from_values(values, 5, 0.0, 0.5);
        assert_eq!(hist.counts, vec![1, 3, 0, 1, 1]);
        assert_eq!(hist.entries(), 6);
        assert_eq!(hist.peak_bin(), Some(1));
        assert_relative_eq!(hist.peak_position().unwrap(), 0.15, max_relative = 1e-12);
    }

    #[test]
    fn test_first_peak_wins_ties() {
        let hist = Histogram::from_values([0.05, 0.25], 5, 0.0, 0.5);
        assert_eq!(hist.peak_bin(), Some(0));
    }

    #[test]
    fn test_empty_histogram_has_no_peak() {
        let hist = Histogram::new(100, 0.0, 0.5);
        assert_eq!(hist.peak_position(), None);
    }
}
