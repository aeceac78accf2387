//! Data model shared by the engine, the store, and the status bus.
//!
//! `QueuedOperation` is the persisted job record; `JobStatusUpdate` is the
//! transient event published to subscribers; `DownloadResult` and
//! `JobOutcome` carry results out of the fetch engine and the job runner.

mod operation;
mod result;
mod status;

pub use operation::{Chapter, ChapterSource, OutputFormat, QueuedOperation};
pub use result::{DownloadResult, FailureReason, JobOutcome};
pub use status::{truncate_status, JobState, JobStatusUpdate, STATUS_TEXT_MAX};
