use std::path::PathBuf;
use thiserror::Error;

use super::run::ChannelId;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum WfmFormatError {
    #[error("Unknown byte order marker {0:02x?} found in WFM header")]
    UnknownByteOrder([u8; 2]),
    #[error("Unknown sample format code {0} found in WFM header")]
    UnknownSampleFormat(i32),
    #[error("WFM header is truncated: {0}")]
    TruncatedHeader(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WfmFileError {
    #[error("WfmFile has a malformed header: {0}")]
    Format(#[from] WfmFormatError),
    #[error("WfmFile holds {available} samples, fewer than one complete frame of {frame_size}")]
    ShortFile { available: usize, frame_size: usize },
    #[error("Could not open WfmFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("WfmFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("WfmFile could not shape samples into frames: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Run is missing a capture file for channel {0}")]
    MissingChannel(ChannelId),
    #[error("Run does not contain any channels")]
    NoChannels,
    #[error("Run failed to read channel {channel} from {path:?}: {source}")]
    BadChannelFile {
        channel: ChannelId,
        path: PathBuf,
        source: WfmFileError,
    },
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Discovery could not find a directory for run {0} in {1:?}")]
    RunNotFound(i32, PathBuf),
    #[error("Discovery did not find any channel capture files in {0:?}")]
    NoMatchingFiles(PathBuf),
    #[error("Discovery failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StackLayoutError {
    #[error("Stack layout {0:?} must name exactly {size} channels", size = super::constants::STACK_SIZE)]
    BadLength(String),
    #[error("Stack layout contains invalid channel {0:?}")]
    BadChannel(char),
    #[error("Stack layout names channel {0} more than once")]
    DuplicateChannel(ChannelId),
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier has no cut value for channel {0}")]
    MissingCut(ChannelId),
    #[error("Classifier has no amplitudes for channel {0}")]
    MissingAmplitudes(ChannelId),
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Solver could not decompose the pair system: {0}")]
    Decomposition(&'static str),
    #[error("Solver did not converge within {0} iterations")]
    NoConvergence(usize),
    #[error("Solver was given pair ({0}, {1}) containing a channel outside the system")]
    UnknownChannel(ChannelId, ChannelId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Report failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Discovery error: {0}")]
    DiscoveryError(#[from] DiscoveryError),
    #[error("Processor failed due to Run error: {0}")]
    RunError(#[from] RunError),
    #[error("Processor failed due to Classifier error: {0}")]
    ClassifierError(#[from] ClassifierError),
    #[error("Processor failed due to Solver error: {0}")]
    SolverError(#[from] SolverError),
    #[error("Processor failed due to Report error: {0}")]
    ReportError(#[from] ReportError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
