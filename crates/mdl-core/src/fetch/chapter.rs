//! One chapter: discover images, fetch them on a bounded pool, mark complete.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::image::{fetch_image, page_file_name, ImageOutcome};
use super::options::ChapterRequest;
use super::progress::ProgressTracker;
use crate::cache;
use crate::http::{pick_user_agent, HttpClientFactory};
use crate::model::FailureReason;
use crate::retry::{FetchError, RetryPolicy};
use crate::scraper::Scraper;
use crate::settings::{UserAgentProvider, WorkerProvider};
use crate::storage;

#[derive(Debug)]
pub(crate) enum ChapterOutcome {
    Completed { pages: usize },
    Failed(Vec<FailureReason>),
    Cancelled,
}

/// Everything a chapter task needs, cloned out of the engine and options.
pub(crate) struct ChapterTask {
    pub http: Arc<dyn HttpClientFactory>,
    pub scraper: Arc<dyn Scraper>,
    pub proxy: Option<String>,
    pub retry: RetryPolicy,
    pub image_workers: WorkerProvider,
    pub user_agents: UserAgentProvider,
    pub tracker: Arc<ProgressTracker>,
    pub cancel: CancellationToken,
    pub dest: PathBuf,
}

fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

impl ChapterTask {
    pub(crate) async fn run(self, idx: usize, req: &ChapterRequest) -> ChapterOutcome {
        let ua = pick_user_agent(&(self.user_agents)());
        let client = self.http.client(self.proxy.as_deref(), ua.as_deref());

        let discovered = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return ChapterOutcome::Cancelled,
            r = self.scraper.find_image_urls(client.as_ref(), &req.url) => r,
        };
        let urls = match discovered {
            Ok(urls) => dedupe(urls),
            Err(FetchError::Cancelled) => return ChapterOutcome::Cancelled,
            Err(e) => {
                tracing::debug!(chapter = %req.title, "image discovery failed: {e}");
                self.tracker.settle(idx, format!("{}: no images found", req.title));
                let msg = format!("no images found ({e})");
                return ChapterOutcome::Failed(vec![if e.is_transient() {
                    FailureReason::transient(msg)
                } else {
                    FailureReason::permanent(msg)
                }]);
            }
        };
        if urls.is_empty() {
            self.tracker.settle(idx, format!("{}: no images found", req.title));
            return ChapterOutcome::Failed(vec![FailureReason::permanent("no images found")]);
        }

        let dir = self.dest.join(&req.folder);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            self.tracker.settle(idx, format!("{}: failed", req.title));
            return ChapterOutcome::Failed(vec![FailureReason::permanent(format!(
                "create {}: {e}",
                dir.display()
            ))]);
        }
        if let Err(e) = storage::remove_stale_parts(&dir).await {
            tracing::debug!(dir = %dir.display(), "could not sweep temp files: {e:#}");
        }

        let total = urls.len();
        self.tracker.set_expected(idx, total);
        let mut pending = urls.into_iter().enumerate();
        let mut join_set = JoinSet::new();
        let mut settled = 0usize;
        let mut fetched = 0usize;
        let mut failures = Vec::new();
        let mut cancelled = false;

        loop {
            while !self.cancel.is_cancelled() && join_set.len() < (self.image_workers)().max(1) {
                let Some((i, url)) = pending.next() else {
                    break;
                };
                let path = dir.join(page_file_name(i, &url));
                let client = Arc::clone(&client);
                let token = self.cancel.child_token();
                let policy = self.retry;
                join_set.spawn(async move {
                    let outcome = fetch_image(client, policy, token, url, &path).await;
                    (i, outcome)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (i, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    failures.push(FailureReason::permanent(format!("image task failed: {e}")));
                    settled += 1;
                    continue;
                }
            };
            match outcome {
                ImageOutcome::Saved => fetched += 1,
                ImageOutcome::Skipped => {}
                ImageOutcome::Failed(reason) => {
                    tracing::debug!(chapter = %req.title, page = i + 1, "image failed: {reason}");
                    failures.push(reason);
                }
                ImageOutcome::Cancelled => {
                    cancelled = true;
                    continue;
                }
            }
            settled += 1;
            self.tracker
                .image_settled(idx, format!("{}: {settled}/{total} images", req.title));
        }

        if cancelled || self.cancel.is_cancelled() {
            return ChapterOutcome::Cancelled;
        }
        if !failures.is_empty() {
            self.tracker.settle(idx, format!("{}: failed", req.title));
            return ChapterOutcome::Failed(failures);
        }
        if let Err(e) = cache::mark_chapter_complete(&dir, total).await {
            self.tracker.settle(idx, format!("{}: failed", req.title));
            return ChapterOutcome::Failed(vec![FailureReason::permanent(format!("{e:#}"))]);
        }
        tracing::debug!(chapter = %req.title, pages = total, fetched, "chapter complete");
        self.tracker.settle(idx, format!("{}: done", req.title));
        ChapterOutcome::Completed { pages: total }
    }
}
