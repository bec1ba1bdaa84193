use ndarray::{Array1, ArrayView1, Axis};

use super::wfm_file::Waveforms;

/// Index and value of the most negative sample (the first one on ties)
pub fn find_minimum(trace: ArrayView1<'_, f64>) -> Option<(usize, f64)> {
    let mut found: Option<(usize, f64)> = None;
    for (index, &value) in trace.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        if found.map_or(true, |(_, min)| value < min) {
            found = Some((index, value));
        }
    }
    found
}

/// Pulse amplitude of a negative-going trace: the magnitude of its most negative sample.
pub fn amplitude(trace: ArrayView1<'_, f64>) -> f64 {
    find_minimum(trace).map(|(_, v)| v.abs()).unwrap_or(f64::NAN)
}

/// Amplitude of every frame in a channel, in volts
pub fn amplitudes(waveforms: &Waveforms) -> Array1<f64> {
    waveforms
        .traces
        .axis_iter(Axis(0))
        .map(amplitude)
        .collect()
}

/// Largest positive excursion in a trace, used to flag electronic noise
pub fn max_excursion(trace: ArrayView1<'_, f64>) -> f64 {
    trace.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_amplitude() {
        let trace = array![0.0, -0.01, -0.2, -0.05, 0.02];
        assert_eq!(find_minimum(trace.view()), Some((2, -0.2)));
        assert_eq!(amplitude(trace.view()), 0.2);
        assert_eq!(max_excursion(trace.view()), 0.02);
    }

    #[test]
    fn test_first_minimum_wins() {
        let trace = array![0.0, -0.3, 0.0, -0.3];
        assert_eq!(find_minimum(trace.view()), Some((1, -0.3)));
    }

    #[test]
    fn test_empty_trace() {
        let trace: Array1<f64> = array![];
        assert_eq!(find_minimum(trace.view()), None);
        assert!(amplitude(trace.view()).is_nan());
    }

    #[test]
    fn test_channel_amplitudes() {
        let waveforms = Waveforms {
            time: array![0.0, 1.0, 2.0],
            traces: Array2::from_shape_vec((2, 3), vec![0.0, -0.1, 0.0, -0.4, 0.0, 0.1]).unwrap(),
        };
        assert_eq!(amplitudes(&waveforms), array![0.1, 0.4]);
    }
}
