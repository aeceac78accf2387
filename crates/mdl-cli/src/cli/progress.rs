//! Single-line progress rendering of status bus updates.

use anyhow::{bail, Result};
use mdl_core::model::JobStatusUpdate;
use mdl_core::status_bus::StatusSubscription;
use mdl_core::supervisor::DownloadBackend;
use std::io::Write;
use std::sync::Arc;

const LINE_WIDTH: usize = 100;

/// Accumulated view of one job's updates.
#[derive(Debug, Default)]
pub struct ProgressLine {
    total: usize,
    downloaded: usize,
    progress: f32,
    status: String,
}

impl ProgressLine {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, update: &JobStatusUpdate) {
        if let Some(p) = update.progress {
            self.progress = self.progress.max(p.clamp(0.0, 1.0));
        }
        if let Some(n) = update.downloaded_chapters {
            self.downloaded += n as usize;
        }
        if let Some(status) = &update.status {
            self.status = status.clone();
        }
    }

    pub fn render(&self) -> String {
        let line = format!(
            "[{:>5.1}%] {}/{} chapters  {}",
            self.progress * 100.0,
            self.downloaded,
            self.total,
            self.status
        );
        line.chars().take(LINE_WIDTH).collect()
    }

    fn print(&self) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{:<width$}", self.render(), width = LINE_WIDTH);
        let _ = out.flush();
    }
}

/// Render updates for `job_id` until its final update. The first Ctrl-C asks
/// the backend to stop the job; the final (paused) update still ends the loop.
pub async fn follow_job(
    backend: Arc<dyn DownloadBackend>,
    sub: &mut StatusSubscription,
    job_id: &str,
    total: usize,
) -> Result<JobStatusUpdate> {
    let mut line = ProgressLine::new(total);
    let mut stopping = false;
    loop {
        tokio::select! {
            update = sub.recv() => {
                let Some(update) = update else {
                    bail!("status stream closed before {job_id} finished");
                };
                if update.job_id != job_id {
                    continue;
                }
                line.apply(&update);
                line.print();
                if update.is_finished {
                    println!();
                    return Ok(update);
                }
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                println!();
                println!("Stopping {job_id}; finishing in-flight pages...");
                let backend = Arc::clone(&backend);
                let id = job_id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = backend.stop_job(&id).await {
                        tracing::warn!(job_id = %id, "stop failed: {e:#}");
                    }
                });
            }
        }
    }
}
