//! Status events published on the bus, and the job state stored with each record.

use serde::{Deserialize, Serialize};

/// Upper bound on user-visible status and error text (characters).
pub const STATUS_TEXT_MAX: usize = 160;

/// Truncate user-visible text to `STATUS_TEXT_MAX` characters, marking the cut with `…`.
pub fn truncate_status(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= STATUS_TEXT_MAX {
        return text.to_string();
    }
    let mut out: String = text.chars().take(STATUS_TEXT_MAX - 1).collect();
    out.push('…');
    out
}

/// One status event for a job. Transient: published on the status bus, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Overall fraction in `[0, 1]`; non-decreasing within a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    /// Number of chapters newly counted as downloaded since the previous update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_chapters: Option<u32>,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobStatusUpdate {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: None,
            progress: None,
            downloaded_chapters: None,
            is_finished: false,
            error_message: None,
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(truncate_status(status));
        self
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = Some(progress.clamp(0.0, 1.0));
        self
    }

    pub fn with_downloaded(mut self, delta: u32) -> Self {
        self.downloaded_chapters = Some(delta);
        self
    }

    pub fn with_error(mut self, message: &str) -> Self {
        self.error_message = Some(truncate_status(message));
        self
    }

    pub fn finished(mut self) -> Self {
        self.is_finished = true;
        self
    }
}

/// Lifecycle state stored alongside each persisted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "paused" => JobState::Paused,
            "completed" => JobState::Completed,
            _ => JobState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}
