//! Per-chapter completion hook: record the chapter as cached and persist.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::fetch::ChapterCompletion;
use crate::model::{JobStatusUpdate, QueuedOperation};
use crate::status_bus::StatusBus;
use crate::store::OperationStore;

/// Shares the job's operation record with the runner. The mutex serializes
/// the update-then-save sequence, so writes for one job never interleave.
pub(crate) struct PersistOnComplete {
    pub op: Arc<Mutex<QueuedOperation>>,
    pub store: OperationStore,
    pub bus: StatusBus,
    pub job_id: String,
}

#[async_trait]
impl ChapterCompletion for PersistOnComplete {
    async fn chapter_completed(&self, chapter_url: &str) {
        {
            let mut op = self.op.lock().await;
            match op.chapter_mut(chapter_url) {
                Some(chapter) => chapter.mark_cached(),
                None => tracing::debug!(chapter_url, "completed chapter not in job record"),
            }
            if let Err(e) = self.store.save(&op).await {
                tracing::warn!(job_id = %self.job_id, "saving job record failed: {e:#}");
            }
        }
        self.bus
            .publish(JobStatusUpdate::new(&self.job_id).with_downloaded(1));
    }
}
