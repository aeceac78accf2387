//! Runner-internal error classes and how they map to outcomes.

use crate::control::JobAborted;

/// Why a run stopped early.
///
/// `Cancelled` and `Transport` pause the job (metadata kept, safe to resume);
/// `Fatal` fails it and is not retried automatically.
#[derive(Debug, thiserror::Error)]
pub(crate) enum JobError {
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Transport(String),
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl From<JobAborted> for JobError {
    fn from(_: JobAborted) -> Self {
        JobError::Cancelled
    }
}
