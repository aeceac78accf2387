//! Cooperative cancellation primitives.
//!
//! A running job owns a `CancellationToken`; each chapter gets a child token
//! and each image a grandchild, so stopping a job reaches every in-flight
//! task. Tasks notice at their next checkpoint and unwind with `JobAborted`.

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Error returned when a download is stopped by user (pause/cancel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job aborted by user")
    }
}

impl std::error::Error for JobAborted {}

/// Checkpoint: `Err(JobAborted)` once `token` has been cancelled.
pub fn checkpoint(token: &CancellationToken) -> Result<(), JobAborted> {
    if token.is_cancelled() {
        Err(JobAborted)
    } else {
        Ok(())
    }
}

/// Default path for the daemon control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("mdl")?.get_state_home();
    Ok(dir.join("control.sock"))
}
