use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::AnalysisConfig;
use super::error::ClassifierError;
use super::histogram::Histogram;
use super::pulse::max_excursion;
use super::run::ChannelId;
use super::stack_layout::{StackLayout, StackPosition};
use super::wfm_file::Waveforms;

/// Amplitude cut for one channel.
///
/// Edge detectors are cut at a fraction of their Landau peak so corner-clipped
/// tracks are removed. Middle detectors (and channels with no known position) only
/// get the floor: their spectrum extends upward for angled tracks.
pub fn compute_cut(
    amplitudes: ArrayView1<'_, f64>,
    position: Option<StackPosition>,
    config: &AnalysisConfig,
) -> f64 {
    let floor = config.cut_floor_v;
    match position {
        Some(p) if p.is_edge() => {
            let hist = Histogram::from_values(
                amplitudes.iter().copied(),
                config.cut_histogram_bins,
                0.0,
                config.cut_histogram_max_v,
            );
            match hist.peak_position() {
                Some(peak) => floor.max(peak * config.top_bottom_cut_fraction),
                None => floor,
            }
        }
        _ => floor,
    }
}

/// Cut values for every channel of a run
pub fn compute_cuts(
    amplitudes: &BTreeMap<ChannelId, Array1<f64>>,
    layout: Option<&StackLayout>,
    config: &AnalysisConfig,
) -> BTreeMap<ChannelId, f64> {
    amplitudes
        .iter()
        .map(|(channel, amps)| {
            let position = layout.and_then(|l| l.position_of(*channel));
            (*channel, compute_cut(amps.view(), position, config))
        })
        .collect()
}

/// Disjoint, ordered partition of a run's event indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCategories {
    pub clean: Vec<usize>,
    pub clipped: Vec<usize>,
    pub noise: Vec<usize>,
}

impl EventCategories {
    pub fn n_events(&self) -> usize {
        self.clean.len() + self.clipped.len() + self.noise.len()
    }

    /// Events with a genuine pulse in every channel (clean and clipped), in order
    pub fn accepted(&self) -> Vec<usize> {
        let mut accepted: Vec<usize> = self
            .clean
            .iter()
            .chain(self.clipped.iter())
            .copied()
            .collect();
        accepted.sort_unstable();
        accepted
    }
}

/// Sort every event of a run into noise, clipped, or clean.
///
/// An event is noise if any channel swings above `noise_threshold`; otherwise it is
/// clipped if any channel falls below its cut; otherwise it is clean.
pub fn classify(
    traces: &BTreeMap<ChannelId, Waveforms>,
    amplitudes: &BTreeMap<ChannelId, Array1<f64>>,
    cuts: &BTreeMap<ChannelId, f64>,
    noise_threshold: f64,
) -> Result<EventCategories, ClassifierError> {
    let mut channels = Vec::with_capacity(traces.len());
    for (channel, waveforms) in traces.iter() {
        let amps = amplitudes
            .get(channel)
            .ok_or(ClassifierError::MissingAmplitudes(*channel))?;
        let cut = *cuts.get(channel).ok_or(ClassifierError::MissingCut(*channel))?;
        channels.push((waveforms, amps, cut));
    }
    let n_events = channels
        .iter()
        .map(|(waveforms, amps, _)| waveforms.n_frames().min(amps.len()))
        .min()
        .unwrap_or(0);

    let mut categories = EventCategories::default();
    for event in 0..n_events {
        let is_noise = channels
            .iter()
            .any(|(waveforms, _, _)| max_excursion(waveforms.trace(event)) > noise_threshold);
        if is_noise {
            categories.noise.push(event);
            continue;
        }
        // A NaN amplitude never passes the cut
        let is_clipped = channels
            .iter()
            .any(|(_, amps, cut)| !(amps[event] >= *cut));
        if is_clipped {
            categories.clipped.push(event);
        } else {
            categories.clean.push(event);
        }
    }
    Ok(categories)
}
