//! Inputs to one fetch-engine invocation.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::settings::{UserAgentProvider, WorkerProvider};

/// Progress callback: overall fraction in `[0, 1]` plus a short status line.
pub type ProgressFn = Arc<dyn Fn(f32, String) + Send + Sync>;

/// One chapter to fetch into `dest/<folder>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRequest {
    pub url: String,
    pub title: String,
    /// Cache folder name (see `url_model::assign_chapter_folders`).
    pub folder: String,
}

/// Called once per chapter that finished completely, after its `.complete`
/// marker is on disk. Calls for one invocation never overlap.
#[async_trait]
pub trait ChapterCompletion: Send + Sync {
    async fn chapter_completed(&self, chapter_url: &str);
}

#[derive(Debug, Default)]
pub struct NoopCompletion;

#[async_trait]
impl ChapterCompletion for NoopCompletion {
    async fn chapter_completed(&self, _chapter_url: &str) {}
}

#[derive(Clone)]
pub struct DownloadOptions {
    pub chapters: Vec<ChapterRequest>,
    pub chapter_workers: WorkerProvider,
    pub image_workers: WorkerProvider,
    pub user_agents: UserAgentProvider,
    pub progress: ProgressFn,
    pub on_chapter_complete: Arc<dyn ChapterCompletion>,
    pub cancel: CancellationToken,
}

impl DownloadOptions {
    /// Defaults: 4 chapter workers, 10 image workers, no user agents, no callbacks.
    pub fn new(chapters: Vec<ChapterRequest>, cancel: CancellationToken) -> Self {
        Self {
            chapters,
            chapter_workers: Arc::new(|| 4),
            image_workers: Arc::new(|| 10),
            user_agents: Arc::new(Vec::new),
            progress: Arc::new(|_, _| {}),
            on_chapter_complete: Arc::new(NoopCompletion),
            cancel,
        }
    }

    pub fn with_workers(mut self, chapter_workers: WorkerProvider, image_workers: WorkerProvider) -> Self {
        self.chapter_workers = chapter_workers;
        self.image_workers = image_workers;
        self
    }

    pub fn with_user_agents(mut self, user_agents: UserAgentProvider) -> Self {
        self.user_agents = user_agents;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_completion(mut self, hook: Arc<dyn ChapterCompletion>) -> Self {
        self.on_chapter_complete = hook;
        self
    }
}

impl std::fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("chapters", &self.chapters.len())
            .field("chapter_workers", &(self.chapter_workers)())
            .field("image_workers", &(self.image_workers)())
            .finish_non_exhaustive()
    }
}
