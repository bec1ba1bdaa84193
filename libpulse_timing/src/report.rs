use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::analysis::RunAnalysis;
use super::config::{RunParams, RunType};
use super::constants::{SECONDS_TO_NS, VOLTS_TO_MV};
use super::error::ReportError;
use super::histogram::Histogram;
use super::jitter::{JitterSolution, JitterStatus, PairObservation};
use super::run::ChannelId;
use super::stack_layout::StackPosition;
use super::timing::{time_stats, PairStats};

/// Per-channel amplitude summary. The histogram is in volts over the run's Landau
/// range and is what the external fitter consumes. The time fields describe the CFD
/// time of the clean events relative to the scope trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: ChannelId,
    pub position: Option<StackPosition>,
    pub cut_v: f64,
    pub mean_amplitude_mv: f64,
    pub amplitude_histogram: Histogram,
    pub mpv_mv: Option<f64>,
    pub mpv_mev: Option<f64>,
    pub undefined_times: usize,
    pub n_times: usize,
    pub mean_time_ns: f64,
    pub sigma_time_ns: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub channel_a: ChannelId,
    pub channel_b: ChannelId,
    pub count: usize,
    pub mean_ns: f64,
    pub variance_ns2: f64,
    pub sigma_ns: f64,
}

impl From<&PairStats> for PairReport {
    fn from(stats: &PairStats) -> Self {
        Self {
            channel_a: stats.channel_a,
            channel_b: stats.channel_b,
            count: stats.count,
            mean_ns: stats.mean * SECONDS_TO_NS,
            variance_ns2: stats.variance * SECONDS_TO_NS * SECONDS_TO_NS,
            sigma_ns: stats.sigma() * SECONDS_TO_NS,
        }
    }
}

impl PairReport {
    pub fn observation(&self) -> PairObservation {
        PairObservation {
            channel_a: self.channel_a,
            channel_b: self.channel_b,
            variance: self.variance_ns2,
        }
    }
}

/// Measured and predicted pair sigma, in ns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairCheckReport {
    pub channel_a: ChannelId,
    pub channel_b: ChannelId,
    pub measured_ns: f64,
    pub predicted_ns: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitterReport {
    pub status: JitterStatus,
    pub sigmas_ns: BTreeMap<ChannelId, f64>,
    pub cost_ns4: f64,
    pub pair_checks: Vec<PairCheckReport>,
}

impl JitterReport {
    /// Convert a solution whose variances are in `unit_to_ns` squared units
    pub fn from_solution(solution: &JitterSolution, unit_to_ns: f64) -> Self {
        Self {
            status: solution.status,
            sigmas_ns: solution
                .sigmas
                .iter()
                .map(|(channel, sigma)| (*channel, sigma * unit_to_ns))
                .collect(),
            cost_ns4: solution.cost * unit_to_ns.powi(4),
            pair_checks: solution
                .pair_checks
                .iter()
                .map(|check| PairCheckReport {
                    channel_a: check.channel_a,
                    channel_b: check.channel_b,
                    measured_ns: check.measured_sigma * unit_to_ns,
                    predicted_ns: check.predicted_sigma * unit_to_ns,
                })
                .collect(),
        }
    }
}

/// The result of one run, written as `<run_name>_report.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_number: i32,
    pub run_name: String,
    pub layout: Option<String>,
    pub run_type: RunType,
    pub notes: Option<String>,
    pub n_events: usize,
    pub n_clean: usize,
    pub n_clipped: usize,
    pub n_noise: usize,
    pub channels: Vec<ChannelReport>,
    pub pairs: Vec<PairReport>,
    pub middle_pair: Option<PairReport>,
    pub jitter: Option<JitterReport>,
}

impl RunReport {
    pub fn new(
        analysis: &RunAnalysis,
        params: &RunParams,
        calibration: &BTreeMap<ChannelId, f64>,
    ) -> Self {
        let accepted = analysis.categories.accepted();
        let channels = analysis
            .amplitudes
            .iter()
            .map(|(channel, amps)| {
                let values: Vec<f64> = accepted.iter().map(|event| amps[*event]).collect();
                let mean_amplitude_mv = if values.is_empty() {
                    f64::NAN
                } else {
                    values.iter().sum::<f64>() / values.len() as f64 * VOLTS_TO_MV
                };
                let amplitude_histogram = Histogram::from_values(
                    values,
                    params.landau_bins,
                    params.landau_lower,
                    params.landau_upper,
                );
                let mpv_mv = amplitude_histogram.peak_position().map(|v| v * VOLTS_TO_MV);
                let mpv_mev = mpv_mv.zip(calibration.get(channel)).map(|(mv, k)| mv * k);
                let (n_times, mean_time_ns, sigma_time_ns) = match analysis.times.get(channel) {
                    Some(times) => {
                        let stats = time_stats(*channel, times.view());
                        (
                            stats.count,
                            stats.mean * SECONDS_TO_NS,
                            stats.sigma() * SECONDS_TO_NS,
                        )
                    }
                    None => (0, f64::NAN, f64::NAN),
                };
                ChannelReport {
                    channel: *channel,
                    position: analysis.layout.as_ref().and_then(|l| l.position_of(*channel)),
                    cut_v: analysis.cuts.get(channel).copied().unwrap_or(f64::NAN),
                    mean_amplitude_mv,
                    amplitude_histogram,
                    mpv_mv,
                    mpv_mev,
                    undefined_times: analysis.undefined_times(*channel),
                    n_times,
                    mean_time_ns,
                    sigma_time_ns,
                }
            })
            .collect();

        Self {
            run_number: analysis.run_number,
            run_name: analysis.run_name.clone(),
            layout: analysis.layout.as_ref().map(|l| l.to_string()),
            run_type: params.run_type,
            notes: params.notes.clone(),
            n_events: analysis.n_events,
            n_clean: analysis.categories.clean.len(),
            n_clipped: analysis.categories.clipped.len(),
            n_noise: analysis.categories.noise.len(),
            channels,
            pairs: analysis.pair_stats.iter().map(PairReport::from).collect(),
            middle_pair: analysis.middle_pair_stats().map(PairReport::from),
            jitter: analysis
                .jitter
                .as_ref()
                .map(|j| JitterReport::from_solution(j, SECONDS_TO_NS)),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        write_yaml(self, path)
    }

    pub fn read(path: &Path) -> Result<Self, ReportError> {
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}

/// Jitter solved across runs from the middle pair of each, written as
/// `combined_jitter.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedReport {
    pub runs: Vec<i32>,
    pub observations: Vec<PairReport>,
    pub jitter: JitterReport,
}

impl CombinedReport {
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        write_yaml(self, path)
    }
}

fn write_yaml<T: Serialize>(value: &T, path: &Path) -> Result<(), ReportError> {
    let yaml_str = serde_yaml::to_string(value)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    log::info!("Wrote report to {}", path.to_string_lossy());
    Ok(())
}
