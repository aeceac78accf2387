//! Results produced by the fetch engine and the job runner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Why a chapter (or one of its images) could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub message: String,
    /// Transport-class failure (timeout, connection, 5xx); a later run may succeed.
    pub transient: bool,
}

impl FailureReason {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of one fetch-engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub successful_folders: Vec<PathBuf>,
    /// Chapter title -> reasons. Every entry has at least one reason.
    pub failed_chapters: BTreeMap<String, Vec<FailureReason>>,
}

impl DownloadResult {
    pub fn record_failure(&mut self, title: &str, reason: FailureReason) {
        self.failed_chapters
            .entry(title.to_string())
            .or_default()
            .push(reason);
    }

    /// Nothing succeeded and every failure was transport-class: the network is
    /// the likely culprit, so the job should pause rather than ship an empty archive.
    pub fn is_transport_outage(&self) -> bool {
        self.successful_folders.is_empty()
            && !self.failed_chapters.is_empty()
            && self
                .failed_chapters
                .values()
                .flatten()
                .all(|r| r.transient)
    }

    /// Titles of failed chapters, in title order.
    pub fn failed_titles(&self) -> Vec<String> {
        self.failed_chapters.keys().cloned().collect()
    }
}

/// Terminal outcome of one job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// Archive placed. `result.failed_chapters` lists anything missing from it.
    Completed {
        archive: String,
        result: DownloadResult,
    },
    /// Cancelled or interrupted by a recoverable error; safe to resume.
    Paused { reason: String },
    /// Unexpected or logic error; not retried automatically.
    Failed { message: String },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, JobOutcome::Paused { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_outage_requires_all_transient() {
        let mut r = DownloadResult::default();
        assert!(!r.is_transport_outage());
        r.record_failure("Ch 1", FailureReason::transient("connection reset"));
        r.record_failure("Ch 2", FailureReason::transient("HTTP 503"));
        assert!(r.is_transport_outage());
        r.record_failure("Ch 2", FailureReason::permanent("HTTP 404"));
        assert!(!r.is_transport_outage());
    }

    #[test]
    fn any_success_is_not_an_outage() {
        let mut r = DownloadResult::default();
        r.record_failure("Ch 1", FailureReason::transient("timeout"));
        r.successful_folders.push(PathBuf::from("/tmp/ch2"));
        assert!(!r.is_transport_outage());
        assert_eq!(r.failed_titles(), vec!["Ch 1".to_string()]);
    }
}
