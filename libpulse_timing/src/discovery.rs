use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::config::Config;
use super::constants::{CHANNEL_TAG, LAYOUT_TAG, STACK_SIZE, WFM_EXTENSION};
use super::error::DiscoveryError;
use super::run::{ChannelId, RunFiles};
use super::stack_layout::StackLayout;

/// Find the directory of a run under `data_path`.
///
/// Run directories are named `run<NNN>` followed by optional tags, e.g.
/// `run011_1000_config_1342_thorium`. The first match in name order wins.
fn find_run_directory(data_path: &Path, run_number: i32) -> Result<PathBuf, DiscoveryError> {
    let run_str = Config::get_run_str(run_number);
    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(data_path)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };
        // run001 must not match run0012
        if let Some(rest) = name.strip_prefix(&run_str) {
            if !rest.starts_with(|c: char| c.is_ascii_digit()) {
                candidates.push(path);
            }
        }
    }
    candidates.sort();
    if candidates.len() > 1 {
        log::warn!(
            "Found {} directories for run {}, using {}",
            candidates.len(),
            run_number,
            candidates[0].to_string_lossy()
        );
    }
    candidates
        .into_iter()
        .next()
        .ok_or(DiscoveryError::RunNotFound(run_number, data_path.to_path_buf()))
}

/// Split a capture file name `<prefix>_Ch<N>.wfm` into prefix and channel
fn parse_channel_file(path: &Path) -> Option<(String, ChannelId)> {
    if path.extension()?.to_str()? != WFM_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (prefix, channel) = stem.rsplit_once(CHANNEL_TAG)?;
    let channel = channel.parse::<ChannelId>().ok()?;
    Some((prefix.to_string(), channel))
}

/// The stack layout encoded in a run directory name as `config_ABCD`, if any
pub fn parse_layout(dir_name: &str) -> Option<StackLayout> {
    let (_, rest) = dir_name.split_once(LAYOUT_TAG)?;
    let token: String = rest.chars().take(STACK_SIZE).collect();
    match StackLayout::from_str(&token) {
        Ok(layout) => Some(layout),
        Err(e) => {
            log::warn!("Ignoring stack layout in {dir_name}: {e}");
            None
        }
    }
}

/// Locate the capture files of a run.
///
/// A directory may hold captures from several acquisitions; they are grouped by the
/// file name prefix before `_Ch` and the first prefix in name order is used.
pub fn find_run_files(data_path: &Path, run_number: i32) -> Result<RunFiles, DiscoveryError> {
    let directory = find_run_directory(data_path, run_number)?;

    let mut groups: BTreeMap<String, BTreeMap<ChannelId, PathBuf>> = BTreeMap::new();
    for entry in std::fs::read_dir(&directory)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some((prefix, channel)) = parse_channel_file(&path) {
            groups.entry(prefix).or_default().insert(channel, path);
        }
    }
    if groups.len() > 1 {
        log::warn!(
            "Run {} has captures with {} different prefixes, only the first is used",
            run_number,
            groups.len()
        );
    }
    let channels = groups
        .into_values()
        .next()
        .ok_or_else(|| DiscoveryError::NoMatchingFiles(directory.clone()))?;

    let dir_name = directory
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(RunFiles {
        run_number,
        run_name: Config::get_run_str(run_number),
        layout: parse_layout(&dir_name),
        directory,
        channels,
    })
}
