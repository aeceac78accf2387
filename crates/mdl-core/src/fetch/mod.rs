//! Fetch engine: chapters on one bounded pool, each chapter's images on a second.
//!
//! A chapter succeeds only when it has at least one image and every image
//! landed on disk; anything else goes into `failed_chapters` with reasons, and
//! never stops the other chapters. Single image requests retry with backoff;
//! chapters are not retried here, a later run picks them up instead.
//!
//! Worker counts are read from their providers each time a slot opens, so a
//! live settings change applies to the next chapter or image dispatched.

mod chapter;
mod image;
mod options;
mod progress;

pub use options::{ChapterCompletion, ChapterRequest, DownloadOptions, NoopCompletion, ProgressFn};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::control::{checkpoint, JobAborted};
use crate::http::HttpClientFactory;
use crate::model::{DownloadResult, FailureReason};
use crate::retry::RetryPolicy;
use crate::scraper::Scraper;
use chapter::{ChapterOutcome, ChapterTask};
use progress::ProgressTracker;

#[derive(Clone)]
pub struct FetchEngine {
    http: Arc<dyn HttpClientFactory>,
    scraper: Arc<dyn Scraper>,
    proxy: Option<String>,
    retry: RetryPolicy,
}

impl FetchEngine {
    pub fn new(http: Arc<dyn HttpClientFactory>, scraper: Arc<dyn Scraper>) -> Self {
        Self {
            http,
            scraper,
            proxy: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Route every request through `proxy` (no direct fallback).
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn http(&self) -> &Arc<dyn HttpClientFactory> {
        &self.http
    }

    pub fn scraper(&self) -> &Arc<dyn Scraper> {
        &self.scraper
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Fetch `options.chapters` into `dest/<folder>`.
    ///
    /// Returns `Err(JobAborted)` if the token was cancelled; by then every
    /// spawned task has returned and no image write is half done.
    pub async fn download_chapters(
        &self,
        options: DownloadOptions,
        dest: &Path,
    ) -> Result<DownloadResult, JobAborted> {
        checkpoint(&options.cancel)?;
        let tracker = Arc::new(ProgressTracker::new(
            options.chapters.len(),
            Arc::clone(&options.progress),
        ));
        let mut result = DownloadResult::default();
        let mut succeeded: Vec<(usize, std::path::PathBuf)> = Vec::new();
        let mut in_flight: BTreeMap<usize, String> = BTreeMap::new();
        let mut pending = options.chapters.iter().cloned().enumerate();
        let mut join_set = JoinSet::new();

        loop {
            while !options.cancel.is_cancelled()
                && join_set.len() < (options.chapter_workers)().max(1)
            {
                let Some((idx, req)) = pending.next() else {
                    break;
                };
                in_flight.insert(idx, req.title.clone());
                let task = ChapterTask {
                    http: Arc::clone(&self.http),
                    scraper: Arc::clone(&self.scraper),
                    proxy: self.proxy.clone(),
                    retry: self.retry,
                    image_workers: Arc::clone(&options.image_workers),
                    user_agents: Arc::clone(&options.user_agents),
                    tracker: Arc::clone(&tracker),
                    cancel: options.cancel.child_token(),
                    dest: dest.to_path_buf(),
                };
                join_set.spawn(async move {
                    let outcome = task.run(idx, &req).await;
                    (idx, req, outcome)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (idx, req, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("chapter task failed: {e}");
                    continue;
                }
            };
            in_flight.remove(&idx);
            match outcome {
                ChapterOutcome::Completed { pages } => {
                    tracing::info!(chapter = %req.title, pages, "chapter downloaded");
                    succeeded.push((idx, dest.join(&req.folder)));
                    options.on_chapter_complete.chapter_completed(&req.url).await;
                }
                ChapterOutcome::Failed(reasons) => {
                    tracing::warn!(
                        chapter = %req.title,
                        reason = %reasons.first().map(ToString::to_string).unwrap_or_default(),
                        "chapter failed"
                    );
                    for r in reasons {
                        result.record_failure(&req.title, r);
                    }
                }
                ChapterOutcome::Cancelled => {}
            }
        }

        checkpoint(&options.cancel)?;

        // Only a panicked task leaves an entry behind.
        for title in in_flight.into_values() {
            result.record_failure(&title, FailureReason::permanent("chapter task panicked"));
        }
        succeeded.sort_by_key(|(idx, _)| *idx);
        result.successful_folders = succeeded.into_iter().map(|(_, p)| p).collect();
        Ok(result)
    }
}
