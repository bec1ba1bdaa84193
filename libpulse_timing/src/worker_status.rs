/// The step of a run a worker is currently on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunStage {
    #[default]
    Loading,
    Analyzing,
    Writing,
    Done,
    Failed,
}

impl RunStage {
    /// Color of the progress bar for this stage, as an indicatif style name
    pub fn color(&self) -> &'static str {
        match self {
            Self::Loading => "cyan",
            Self::Analyzing => "magenta",
            Self::Writing | Self::Done => "green",
            Self::Failed => "red",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Analyzing => "analyzing",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Progress message sent from a worker thread to the front end
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    /// Fraction of the current run completed, in [0, 1]
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub stage: RunStage,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, stage: RunStage) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            stage,
        }
    }
}
