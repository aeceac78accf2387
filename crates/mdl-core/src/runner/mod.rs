//! Job runner: one `QueuedOperation` from start to a terminal outcome.
//!
//! ```text
//! Starting -> FetchingRemaining | SkippingToPackaging -> Packaging -> Placing
//!          -> Completed | Paused | Failed
//! ```
//!
//! The cache status is read fresh at the start of every run, so a resumed job
//! only fetches what is not already on disk. Each completed chapter is
//! persisted as soon as it lands. Cancellation and network outages pause the
//! job; malformed input and unexpected errors fail it.

mod error;
mod hook;
mod plan;

use anyhow::{anyhow, Context};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::{is_chapter_complete, ChapterCache};
use crate::control::checkpoint;
use crate::fetch::{DownloadOptions, FetchEngine, ProgressFn};
use crate::model::{
    DownloadResult, FailureReason, JobOutcome, JobState, JobStatusUpdate, QueuedOperation,
};
use crate::packaging::{packager_for, Packager};
use crate::placement::{FilesystemPlacement, Placement};
use crate::settings::LiveSettings;
use crate::status_bus::StatusBus;
use crate::store::OperationStore;
use error::JobError;
use hook::PersistOnComplete;
use plan::{plan_run, RunPlan};

/// Runs jobs. Cheap to clone; every field is a shared handle.
#[derive(Clone)]
pub struct JobRunner {
    engine: FetchEngine,
    store: OperationStore,
    cache: ChapterCache,
    bus: StatusBus,
    settings: Arc<LiveSettings>,
    placement: Arc<dyn Placement>,
    packager: Option<Arc<dyn Packager>>,
    keep_cache: bool,
}

impl JobRunner {
    pub fn new(
        engine: FetchEngine,
        store: OperationStore,
        cache: ChapterCache,
        bus: StatusBus,
        settings: Arc<LiveSettings>,
    ) -> Self {
        Self {
            engine,
            store,
            cache,
            bus,
            settings,
            placement: Arc::new(FilesystemPlacement),
            packager: None,
            keep_cache: false,
        }
    }

    pub fn with_placement(mut self, placement: Arc<dyn Placement>) -> Self {
        self.placement = placement;
        self
    }

    /// Use `packager` for every job instead of picking one by output format.
    pub fn with_packager(mut self, packager: Arc<dyn Packager>) -> Self {
        self.packager = Some(packager);
        self
    }

    pub fn keep_cache(mut self, keep: bool) -> Self {
        self.keep_cache = keep;
        self
    }

    pub fn status_bus(&self) -> &StatusBus {
        &self.bus
    }

    pub fn store(&self) -> &OperationStore {
        &self.store
    }

    pub fn cache(&self) -> &ChapterCache {
        &self.cache
    }

    /// Run `op` until it completes, pauses, or fails. Never panics on bad input;
    /// every path ends with a stored state and a final `is_finished` update.
    pub async fn run(&self, op: QueuedOperation, cancel: CancellationToken) -> JobOutcome {
        let job_id = op.job_id.clone();
        let key = op.location_key();
        tracing::info!(job_id = %job_id, key = %key, chapters = op.chapters.len(), "job starting");
        self.publish(JobStatusUpdate::new(&job_id).with_status("Starting").with_progress(0.0));

        let outcome = match self.execute(op, &cancel).await {
            Ok(outcome) => outcome,
            Err(JobError::Cancelled) => JobOutcome::Paused {
                reason: "Paused".to_string(),
            },
            Err(JobError::Transport(reason)) => JobOutcome::Paused { reason },
            Err(JobError::Fatal(e)) => {
                tracing::debug!(job_id = %job_id, "job failed: {e:?}");
                JobOutcome::Failed {
                    message: format!("{e:#}"),
                }
            }
        };

        let (state, update) = match &outcome {
            JobOutcome::Completed { result, .. } => {
                let status = if result.failed_chapters.is_empty() {
                    "Completed".to_string()
                } else {
                    format!("Completed with {} missing chapters", result.failed_chapters.len())
                };
                (
                    JobState::Completed,
                    JobStatusUpdate::new(&job_id).with_status(&status).with_progress(1.0),
                )
            }
            JobOutcome::Paused { reason } => (
                JobState::Paused,
                JobStatusUpdate::new(&job_id).with_status(reason),
            ),
            JobOutcome::Failed { message } => (
                JobState::Failed,
                JobStatusUpdate::new(&job_id)
                    .with_status("Failed")
                    .with_error(message),
            ),
        };
        if let Err(e) = self.store.set_state(&key, state).await {
            tracing::warn!(job_id = %job_id, "storing job state failed: {e:#}");
        }
        tracing::info!(job_id = %job_id, state = state.as_str(), "job finished");
        self.publish(update.finished());
        outcome
    }

    fn publish(&self, update: JobStatusUpdate) {
        self.bus.publish(update);
    }

    async fn execute(&self, mut op: QueuedOperation, cancel: &CancellationToken) -> Result<JobOutcome, JobError> {
        validate(&op)?;
        checkpoint(cancel)?;
        let job_id = op.job_id.clone();
        let key = op.location_key();
        let slug = op.source_slug();
        let title = op.display_title();

        // Starting
        let work_dir = self
            .cache
            .write_source_marker(&slug, &op.series_url, &title)
            .await
            .context("preparing working directory")?;
        self.save(&op).await;
        if let Err(e) = self.store.set_state(&key, JobState::Running).await {
            tracing::warn!(job_id = %job_id, "storing job state failed: {e:#}");
        }

        let status = self
            .cache
            .chapter_status(&slug)
            .await
            .context("reading cache status")?;
        let plan = plan_run(&op, &status, &work_dir);
        let total = plan.total();
        if total == 0 {
            return Err(anyhow!("no chapters selected").into());
        }
        let already = plan.already_complete.len();
        for url in &plan.already_complete {
            if let Some(chapter) = op.chapter_mut(url) {
                chapter.mark_cached();
            }
        }
        tracing::info!(
            job_id = %job_id,
            total,
            cached = already,
            to_fetch = plan.to_fetch.len(),
            unavailable = plan.unavailable.len(),
            "job planned"
        );
        self.publish(
            JobStatusUpdate::new(&job_id)
                .with_status(&format!("{already}/{total} chapters already downloaded"))
                .with_progress(already as f32 / total as f32)
                .with_downloaded(already as u32),
        );

        let RunPlan {
            package,
            to_fetch,
            unavailable,
            ..
        } = plan;

        // FetchingRemaining | SkippingToPackaging
        let mut result = DownloadResult::default();
        if !to_fetch.is_empty() {
            checkpoint(cancel)?;
            let fetch_count = to_fetch.len();
            let urls_by_title: Vec<(String, String)> =
                to_fetch.iter().map(|r| (r.title.clone(), r.url.clone())).collect();
            self.publish(
                JobStatusUpdate::new(&job_id).with_status(&format!("Downloading {fetch_count} chapters")),
            );

            let shared = Arc::new(tokio::sync::Mutex::new(op));
            let hook = Arc::new(PersistOnComplete {
                op: Arc::clone(&shared),
                store: self.store.clone(),
                bus: self.bus.clone(),
                job_id: job_id.clone(),
            });
            let options = {
                let guard = shared.lock().await;
                DownloadOptions::new(to_fetch, cancel.clone())
                    .with_workers(
                        self.settings.chapter_worker_provider(),
                        self.settings.image_worker_provider(Some(guard.workers)),
                    )
                    .with_user_agents(self.settings.user_agent_provider(guard.user_agents.clone()))
                    .with_progress(self.progress_fn(&job_id, already, fetch_count, total))
                    .with_completion(hook)
            };

            result = self.engine.download_chapters(options, &work_dir).await?;

            op = shared.lock().await.clone();
            for (title, url) in &urls_by_title {
                if result.failed_chapters.contains_key(title) {
                    if let Some(chapter) = op.chapter_mut(url) {
                        chapter.mark_broken();
                    }
                }
            }
            self.save(&op).await;

            if result.is_transport_outage() {
                return Err(JobError::Transport(format!(
                    "Paused: network unavailable ({} chapters not fetched)",
                    result.failed_chapters.len()
                )));
            }
        } else {
            self.save(&op).await;
        }
        for (title, source) in unavailable {
            tracing::warn!(job_id = %job_id, chapter = %title, ?source, "chapter source unavailable");
            result.record_failure(&title, FailureReason::permanent("source unavailable"));
        }
        checkpoint(cancel)?;

        // Packaging: only folders whose every page landed.
        self.publish(JobStatusUpdate::new(&job_id).with_status("Packaging"));
        let mut complete = Vec::with_capacity(package.len());
        for folder in package {
            if is_chapter_complete(&folder.dir).await {
                complete.push(folder);
            } else {
                tracing::debug!(job_id = %job_id, chapter = %folder.title, "incomplete chapter left out of archive");
            }
        }
        let package = complete;
        let archive_name = op.archive_file_name();
        let archive_path = work_dir.join(&archive_name);
        let packager = self
            .packager
            .clone()
            .unwrap_or_else(|| packager_for(op.output_format));
        let summary = {
            let title = title.clone();
            let archive_path = archive_path.clone();
            let source_url = op.series_url.clone();
            let failed = result.failed_chapters.clone();
            tokio::task::spawn_blocking(move || {
                packager.create_archive(&title, &package, &archive_path, &source_url, &failed)
            })
            .await
            .map_err(|e| anyhow!("packaging task failed: {e}"))?
            .context("packaging")?
        };
        tracing::info!(job_id = %job_id, pages = summary.pages, chapters = summary.chapters, "archive built");
        if let Err(e) = checkpoint(cancel) {
            let _ = tokio::fs::remove_file(&archive_path).await;
            return Err(e.into());
        }

        // Placing
        self.publish(JobStatusUpdate::new(&job_id).with_status("Placing"));
        let placed = self
            .placement
            .move_to_final_destination(&archive_path, &op.output_path, &archive_name)
            .await;
        if placed.is_empty() {
            return Err(anyhow!("could not move archive to {}", op.output_path).into());
        }

        if result.failed_chapters.is_empty() && !self.keep_cache {
            if let Err(e) = self.cache.remove_source(&slug).await {
                tracing::warn!(job_id = %job_id, "removing cache failed: {e:#}");
            }
        }
        tracing::info!(job_id = %job_id, archive = %placed, missing = result.failed_chapters.len(), "archive placed");
        Ok(JobOutcome::Completed {
            archive: placed,
            result,
        })
    }

    /// Maps the engine's fraction over the fetched chapters onto the whole job.
    fn progress_fn(&self, job_id: &str, already: usize, fetching: usize, total: usize) -> ProgressFn {
        let bus = self.bus.clone();
        let job_id = job_id.to_string();
        Arc::new(move |fraction, status| {
            let overall = (already as f32 + fraction * fetching as f32) / total as f32;
            bus.publish(
                JobStatusUpdate::new(&job_id)
                    .with_progress(overall)
                    .with_status(&status),
            );
        })
    }

    async fn save(&self, op: &QueuedOperation) {
        if let Err(e) = self.store.save(op).await {
            tracing::warn!(job_id = %op.job_id, "saving job record failed: {e:#}");
        }
    }
}

/// Reject operations the runner cannot make sense of.
fn validate(op: &QueuedOperation) -> anyhow::Result<()> {
    if op.job_id.trim().is_empty() {
        anyhow::bail!("job id is empty");
    }
    let url = url::Url::parse(&op.series_url)
        .with_context(|| format!("invalid series url: {}", op.series_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("unsupported url scheme: {}", url.scheme());
    }
    if op.chapters.is_empty() {
        anyhow::bail!("job has no chapters");
    }
    if let Some(c) = op.chapters.iter().find(|c| c.url.trim().is_empty()) {
        anyhow::bail!("chapter {:?} has no url", c.title);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate;
    use crate::model::{Chapter, OutputFormat, QueuedOperation};

    fn op() -> QueuedOperation {
        QueuedOperation {
            job_id: "j".into(),
            series_url: "https://x/manga/s/".into(),
            custom_title: String::new(),
            chapters: vec![Chapter::from_web("https://x/manga/s/chapter-1/", "Chapter 1")],
            workers: 2,
            output_format: OutputFormat::Cbz,
            output_path: String::new(),
            user_agents: vec![],
            allow_nsfw: false,
            series_metadata: None,
            archive_name: None,
        }
    }

    #[test]
    fn validation_rejects_malformed_operations() {
        assert!(validate(&op()).is_ok());
        let mut o = op();
        o.job_id = " ".into();
        assert!(validate(&o).is_err());
        let mut o = op();
        o.series_url = "not a url".into();
        assert!(validate(&o).is_err());
        let mut o = op();
        o.series_url = "ftp://x/manga/s/".into();
        assert!(validate(&o).is_err());
        let mut o = op();
        o.chapters.clear();
        assert!(validate(&o).is_err());
        let mut o = op();
        o.chapters[0].url.clear();
        assert!(validate(&o).is_err());
    }
}
