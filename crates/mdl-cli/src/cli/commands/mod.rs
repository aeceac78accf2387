//! CLI command handlers, one file per command.

mod download;
mod proxy_test;
mod remove;
mod resume;
mod serve;
mod status;
mod stop;

pub use download::{run_download, DownloadArgs};
pub use proxy_test::run_proxy_test;
pub use remove::run_remove;
pub use resume::run_resume;
pub use serve::run_serve;
pub use status::run_status;
pub use stop::run_stop;

#[cfg(test)]
pub(crate) use download::{apply_exclusions, chapter_title_from_url, series_url_of_chapter};

use anyhow::{bail, Result};
use mdl_core::model::{JobStatusUpdate, QueuedOperation};
use mdl_core::supervisor::DownloadBackend;
use std::sync::Arc;

use crate::cli::progress::follow_job;

/// Start `op` on `backend` and render its progress until it finishes.
pub(crate) async fn start_and_follow(backend: Arc<dyn DownloadBackend>, op: QueuedOperation) -> Result<()> {
    let job_id = op.job_id.clone();
    let total = op.chapters.iter().filter(|c| c.selected_source.is_some()).count();
    let mut sub = backend.status_bus().subscribe();
    if !backend.start_job(op).await? {
        println!("Job {job_id} is already running.");
        return Ok(());
    }
    let last = follow_job(Arc::clone(&backend), &mut sub, &job_id, total).await?;
    report(&job_id, &last)
}

fn report(job_id: &str, last: &JobStatusUpdate) -> Result<()> {
    if let Some(err) = &last.error_message {
        bail!("job {job_id} failed: {err}");
    }
    println!("{}", last.status.as_deref().unwrap_or("Finished"));
    Ok(())
}
