use ndarray::Array1;
use std::collections::BTreeMap;

use super::cfd::extract_times;
use super::classifier::{classify, compute_cuts, EventCategories};
use super::config::AnalysisConfig;
use super::error::ClassifierError;
use super::jitter::{solve_jitters, JitterSolution, JitterStatus, SolveMode};
use super::pulse::amplitudes;
use super::run::{ChannelId, Run};
use super::stack_layout::StackLayout;
use super::timing::{all_pair_stats, pair_variances, PairStats};

/// Everything extracted from one run. Amplitudes are indexed by event; times are
/// indexed by position in `categories.clean`.
#[derive(Debug, Clone)]
pub struct RunAnalysis {
    pub run_number: i32,
    pub run_name: String,
    pub layout: Option<StackLayout>,
    pub n_events: usize,
    pub amplitudes: BTreeMap<ChannelId, Array1<f64>>,
    pub cuts: BTreeMap<ChannelId, f64>,
    pub categories: EventCategories,
    pub times: BTreeMap<ChannelId, Array1<f64>>,
    pub pair_stats: Vec<PairStats>,
    pub jitter: Option<JitterSolution>,
}

impl RunAnalysis {
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.amplitudes.keys().copied().collect()
    }

    /// Number of clean events whose time is undefined in the given channel
    pub fn undefined_times(&self, channel: ChannelId) -> usize {
        self.times
            .get(&channel)
            .map(|t| t.iter().filter(|v| v.is_nan()).count())
            .unwrap_or(0)
    }

    /// Pair statistics of the middle pair of the stack, if the layout is known
    pub fn middle_pair_stats(&self) -> Option<&PairStats> {
        let pair = self.layout.as_ref()?.middle_pair();
        self.pair_stats.iter().find(|s| s.key() == pair)
    }
}

/// Amplitudes, cuts and the event partition, without any timing.
pub fn analyze_amplitudes(run: &Run, config: &AnalysisConfig) -> Result<RunAnalysis, ClassifierError> {
    let amps: BTreeMap<ChannelId, Array1<f64>> = run
        .channels()
        .iter()
        .map(|(channel, waveforms)| (*channel, amplitudes(waveforms)))
        .collect();
    let cuts = compute_cuts(&amps, run.layout.as_ref(), config);
    let categories = classify(run.channels(), &amps, &cuts, config.noise_threshold_v)?;
    log::info!(
        "{}: {} events, {} clean, {} clipped, {} noise",
        run.run_name,
        categories.n_events(),
        categories.clean.len(),
        categories.clipped.len(),
        categories.noise.len()
    );

    Ok(RunAnalysis {
        run_number: run.run_number,
        run_name: run.run_name.clone(),
        layout: run.layout.clone(),
        n_events: run.n_events(),
        amplitudes: amps,
        cuts,
        categories,
        times: BTreeMap::new(),
        pair_stats: Vec::new(),
        jitter: None,
    })
}

/// The full per-run pipeline: classification, CFD timing of the clean events, pair
/// statistics and the jitter decomposition.
pub fn analyze_run(
    run: &Run,
    config: &AnalysisConfig,
    mode: SolveMode,
) -> Result<RunAnalysis, ClassifierError> {
    let mut analysis = analyze_amplitudes(run, config)?;
    if run.channels().len() < 2 {
        log::warn!("{}: fewer than two channels, no timing analysis", run.run_name);
        return Ok(analysis);
    }

    let params = config.cfd_params();
    let clean = &analysis.categories.clean;
    analysis.times = run
        .channels()
        .iter()
        .map(|(channel, waveforms)| (*channel, extract_times(waveforms, clean, &params)))
        .collect();
    for channel in run.channel_ids() {
        let undefined = analysis.undefined_times(channel);
        if undefined > 0 {
            log::info!(
                "{}: channel {} has undefined timing in {} of {} clean events",
                run.run_name,
                channel,
                undefined,
                clean.len()
            );
        }
    }

    analysis.pair_stats = all_pair_stats(&analysis.times);
    let channels = run.channel_ids();
    let jitter = if clean.len() < config.min_clean_events {
        log::warn!(
            "{}: only {} clean events (minimum {}), jitter not solved",
            run.run_name,
            clean.len(),
            config.min_clean_events
        );
        JitterSolution::undefined(&channels, JitterStatus::Underdetermined)
    } else {
        match solve_jitters(&pair_variances(&analysis.pair_stats), mode) {
            Ok(solution) => solution,
            Err(e) => {
                log::error!("{}: jitter solver failed: {e}", run.run_name);
                JitterSolution::undefined(&channels, JitterStatus::Failed)
            }
        }
    };
    analysis.jitter = Some(jitter);
    Ok(analysis)
}
