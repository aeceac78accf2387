//! The interface the front end drives, whichever process runs the jobs.

use async_trait::async_trait;

use super::JobSupervisor;
use crate::model::QueuedOperation;
use crate::status_bus::StatusBus;

/// A background downloader. `JobSupervisor` runs jobs in this process;
/// `remote::DaemonClient` forwards to a `mdl serve` daemon. Both deliver
/// status through a local `StatusBus`.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// `Ok(false)` when the job was already running.
    async fn start_job(&self, op: QueuedOperation) -> anyhow::Result<bool>;
    async fn stop_job(&self, job_id: &str) -> anyhow::Result<()>;
    async fn stop_all_jobs(&self) -> anyhow::Result<()>;
    fn status_bus(&self) -> StatusBus;
}

#[async_trait]
impl DownloadBackend for JobSupervisor {
    async fn start_job(&self, op: QueuedOperation) -> anyhow::Result<bool> {
        Ok(JobSupervisor::start_job(self, op))
    }

    async fn stop_job(&self, job_id: &str) -> anyhow::Result<()> {
        JobSupervisor::stop_job(self, job_id).await;
        Ok(())
    }

    async fn stop_all_jobs(&self) -> anyhow::Result<()> {
        JobSupervisor::stop_all_jobs(self).await;
        Ok(())
    }

    fn status_bus(&self) -> StatusBus {
        JobSupervisor::status_bus(self)
    }
}
