//! Single-flight job execution
//!
//! A [`JobRunner`] holds the loaded file and runs at most one processing job
//! on a background thread. Progress and the final outcome travel back over a
//! channel and are handed to a [`Frontend`] on the interactive thread.

pub mod frontend;
pub mod runner;

pub use frontend::{Frontend, JobEvent, SubmitOutcome};
pub use runner::{JobRunner, JobState};
