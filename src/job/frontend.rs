//! Front-end callbacks and the messages the worker sends to them

use std::path::{Path, PathBuf};
use crate::audio::{AudioInfo, OutputFormat};

/// Interactive surface driven by [`JobRunner`](super::JobRunner).
///
/// All methods are called on the thread that owns the runner, never on the
/// worker.
pub trait Frontend {
    fn update_info(&mut self, info: &AudioInfo);

    fn update_progress(&mut self, percent: u8);

    fn notify_success(&mut self);

    fn notify_error(&mut self, message: &str);

    /// Ask where to write the result. `None` or an empty path cancels the job.
    fn ask_save_path(&mut self, format: OutputFormat, suggested: &Path) -> Option<PathBuf>;

    fn set_processing(&mut self, processing: bool);
}

/// Worker -> interactive thread message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Progress(u8),
    Succeeded,
    Failed(String),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress(_))
    }
}

/// What happened to a submit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A job is already running; the request was ignored
    Busy,
    /// No file loaded, or the parameters did not validate
    Rejected,
    /// The save-path prompt was dismissed
    Cancelled,
    Started,
}
