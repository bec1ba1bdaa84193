//! Digital constant-fraction discrimination for negative-going pulses.
use ndarray::{Array1, ArrayView1};

use super::pulse::find_minimum;
use super::wfm_file::Waveforms;

/// Parameters of the digital CFD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfdParams {
    /// Fraction of the peak at which the pulse is timed, in (0, 1)
    pub fraction: f64,
    /// The peak must be more negative than `-noise_floor` (volts) to be timed
    pub noise_floor: f64,
}

/// Arrival time of the pulse in `trace` at `fraction` of its peak.
///
/// Returns None ("undefined timing") when the peak does not clear the noise floor,
/// when the rising edge never sits above the target level, or when the last sample
/// above the target is directly before the peak.
pub fn extract_time(
    time: ArrayView1<'_, f64>,
    trace: ArrayView1<'_, f64>,
    params: &CfdParams,
) -> Option<f64> {
    let (peak_index, v_peak) = find_minimum(trace)?;
    if v_peak > -params.noise_floor {
        return None;
    }
    let v_target = params.fraction * v_peak;

    // Rising edge: everything strictly before the global minimum
    let edge = trace.slice(ndarray::s![..peak_index]);
    let i = edge.iter().rposition(|v| *v > v_target)?;
    if i + 1 >= edge.len() {
        return None;
    }

    let (t_i, t_next) = (*time.get(i)?, *time.get(i + 1)?);
    let (v_i, v_next) = (trace[i], trace[i + 1]);
    let slope = v_next - v_i;
    if slope == 0.0 {
        return Some(t_i);
    }
    Some(t_i + (t_next - t_i) * (v_target - v_i) / slope)
}

/// CFD times of the requested frames of one channel. Undefined times are NaN.
pub fn extract_times(waveforms: &Waveforms, frames: &[usize], params: &CfdParams) -> Array1<f64> {
    frames
        .iter()
        .map(|frame| {
            extract_time(waveforms.time.view(), waveforms.trace(*frame), params)
                .unwrap_or(f64::NAN)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    const PARAMS: CfdParams = CfdParams {
        fraction: 0.3,
        noise_floor: 0.0005,
    };

    fn gaussian_pulse(amp: f64, t0: f64, width: f64, dt: f64, n: usize) -> (Array1<f64>, Array1<f64>) {
        let time = Array1::from_iter((0..n).map(|k| k as f64 * dt));
        let trace = time.mapv(|t| -amp * (-(t - t0).powi(2) / (2.0 * width * width)).exp());
        (time, trace)
    }

    #[test]
    fn test_gaussian_crossing() {
        let (t0, width, dt) = (50.0e-9, 5.0e-9, 0.1e-9);
        let (time, trace) = gaussian_pulse(0.2, t0, width, dt, 1000);
        for fraction in [0.1, 0.3, 0.5, 0.8] {
            let params = CfdParams {
                fraction,
                noise_floor: 0.0005,
            };
            let expected = t0 - width * (-2.0 * f64::ln(fraction)).sqrt();
            let t = extract_time(time.view(), trace.view(), &params).unwrap();
            assert!((t - expected).abs() < dt, "fraction {fraction}: {t} vs {expected}");
        }
    }

    #[test]
    fn test_independent_of_amplitude() {
        let (time, small) = gaussian_pulse(0.05, 40.0e-9, 3.0e-9, 0.2e-9, 500);
        let (_, large) = gaussian_pulse(0.4, 40.0e-9, 3.0e-9, 0.2e-9, 500);
        let t_small = extract_time(time.view(), small.view(), &PARAMS).unwrap();
        let t_large = extract_time(time.view(), large.view(), &PARAMS).unwrap();
        assert!((t_small - t_large).abs() < 1.0e-15);
    }

    #[test]
    fn test_linear_interpolation() {
        let time = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let trace = array![0.0, -0.1, -0.5, -1.0, -0.2];
        // target -0.3 lies between samples 1 and 2
        let t = extract_time(time.view(), trace.view(), &PARAMS).unwrap();
        assert!((t - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_flat_traces_are_undefined() {
        let time = Array1::linspace(0.0, 1.0, 50);
        let zero = Array1::<f64>::zeros(50);
        let negative = Array1::<f64>::from_elem(50, -0.3);
        let shallow = Array1::<f64>::from_elem(50, -0.0001);
        assert_eq!(extract_time(time.view(), zero.view(), &PARAMS), None);
        assert_eq!(extract_time(time.view(), negative.view(), &PARAMS), None);
        assert_eq!(extract_time(time.view(), shallow.view(), &PARAMS), None);
    }

    #[test]
    fn test_starts_below_target() {
        let time = array![0.0, 1.0, 2.0, 3.0];
        let trace = array![-0.5, -0.6, -1.0, -0.2];
        assert_eq!(extract_time(time.view(), trace.view(), &PARAMS), None);
    }

    #[test]
    fn test_crossing_directly_before_peak() {
        let time = array![0.0, 1.0, 2.0, 3.0];
        let trace = array![0.0, 0.0, -0.1, -1.0];
        assert_eq!(extract_time(time.view(), trace.view(), &PARAMS), None);
    }

    #[test]
    fn test_anchors_on_global_minimum() {
        let time = Array1::from_iter((0..10).map(|k| k as f64));
        // The pre-pulse at index 2 dips below the target but is not the global minimum
        let trace = array![0.0, -0.1, -0.5, -0.1, 0.0, -0.2, -0.5, -0.9, -1.0, -0.4];
        let t = extract_time(time.view(), trace.view(), &PARAMS).unwrap();
        assert!((t - (5.0 + 1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_equal_samples_at_crossing() {
        let time = array![0.0, 1.0, 2.0, 3.0, 4.0];
        // v[1] is above target, v[2] equals target exactly
        let trace = array![0.0, -0.2, -0.3, -0.6, -1.0];
        let t = extract_time(time.view(), trace.view(), &PARAMS).unwrap();
        assert!((t - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_extract_times_marks_undefined() {
        let time = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let traces = ndarray::Array2::from_shape_vec(
            (2, 5),
            vec![0.0, -0.1, -0.5, -1.0, -0.2, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
        .unwrap();
        let waveforms = Waveforms { time, traces };
        let times = extract_times(&waveforms, &[0, 1], &PARAMS);
        assert!((times[0] - 1.5).abs() < 1e-12);
        assert!(times[1].is_nan());
    }
}
