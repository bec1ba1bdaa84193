use std::collections::BTreeMap;
use std::path::PathBuf;

use super::error::RunError;
use super::stack_layout::StackLayout;
use super::wfm_file::{WfmFile, Waveforms};

/// A detector readout channel, numbered from 1
pub type ChannelId = u8;

/// The capture files which make up a single run, as handed over by discovery.
#[derive(Debug, Clone)]
pub struct RunFiles {
    pub run_number: i32,
    pub run_name: String,
    pub directory: PathBuf,
    pub channels: BTreeMap<ChannelId, PathBuf>,
    pub layout: Option<StackLayout>,
}

impl RunFiles {
    pub fn get_total_data_size(&self) -> u64 {
        self.channels
            .values()
            .filter_map(|path| path.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }
}

/// A set of channels captured concurrently and sharing an event index.
///
/// Every channel holds exactly the same number of frames, so event `i` refers to
/// the same trigger in all of them.
#[derive(Debug, Clone)]
pub struct Run {
    pub run_number: i32,
    pub run_name: String,
    pub layout: Option<StackLayout>,
    channels: BTreeMap<ChannelId, Waveforms>,
}

impl Run {
    /// Load the capture file of every expected channel and align them.
    ///
    /// Any expected channel without a file fails the whole run; extra channels are
    /// ignored.
    pub fn load(files: &RunFiles, expected: &[ChannelId]) -> Result<Self, RunError> {
        if expected.is_empty() {
            return Err(RunError::NoChannels);
        }
        if let Some(missing) = expected
            .iter()
            .find(|channel| !files.channels.contains_key(channel))
        {
            return Err(RunError::MissingChannel(*missing));
        }
        let mut channels = BTreeMap::new();
        for (channel, path) in files
            .channels
            .iter()
            .filter(|(channel, _)| expected.contains(channel))
        {
            let file = WfmFile::open(path).map_err(|source| RunError::BadChannelFile {
                channel: *channel,
                path: path.clone(),
                source,
            })?;
            channels.insert(*channel, file.waveforms);
        }
        Self::from_waveforms(
            files.run_number,
            files.run_name.clone(),
            files.layout.clone(),
            channels,
        )
    }

    /// Build a run from already decoded channels, truncating all of them to the
    /// smallest common frame count.
    pub fn from_waveforms(
        run_number: i32,
        run_name: String,
        layout: Option<StackLayout>,
        mut channels: BTreeMap<ChannelId, Waveforms>,
    ) -> Result<Self, RunError> {
        let n_events = channels
            .values()
            .map(|w| w.n_frames())
            .min()
            .ok_or(RunError::NoChannels)?;
        for (channel, waveforms) in channels.iter_mut() {
            if waveforms.n_frames() > n_events {
                log::info!(
                    "Run {}: truncating channel {} from {} to {} events",
                    run_number,
                    channel,
                    waveforms.n_frames(),
                    n_events
                );
                waveforms.truncate(n_events);
            }
        }
        Ok(Self {
            run_number,
            run_name,
            layout,
            channels,
        })
    }

    pub fn n_events(&self) -> usize {
        self.channels
            .values()
            .next()
            .map(|w| w.n_frames())
            .unwrap_or(0)
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.keys().copied().collect()
    }

    pub fn channel(&self, channel: ChannelId) -> Option<&Waveforms> {
        self.channels.get(&channel)
    }

    pub fn channels(&self) -> &BTreeMap<ChannelId, Waveforms> {
        &self.channels
    }
}
