//! Shared fixtures: an in-memory web behind the HTTP and scraper seams, and
//! a runner wired to temp directories.
#![allow(dead_code)]

pub mod site_server;

use async_trait::async_trait;
use mdl_core::cache::{ChapterCache, COMPLETE_MARKER};
use mdl_core::fetch::FetchEngine;
use mdl_core::http::{HttpClient, HttpClientFactory};
use mdl_core::model::{Chapter, JobStatusUpdate, OutputFormat, QueuedOperation};
use mdl_core::retry::{ErrorKind, FetchError, RetryPolicy};
use mdl_core::runner::JobRunner;
use mdl_core::scraper::{ChapterLink, Scraper};
use mdl_core::settings::LiveSettings;
use mdl_core::status_bus::{StatusBus, StatusSubscription};
use mdl_core::store::OperationStore;
use mdl_core::url_model::assign_chapter_folders;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SERIES_URL: &str = "https://site.test/manga/solo-leveling/";

pub fn chapter_url(c: usize) -> String {
    format!("{SERIES_URL}chapter-{c}/")
}

fn image_url(c: usize, i: usize) -> String {
    format!("https://img.test/{c}/{i}.png")
}

/// Chapter number from an image URL built by `image_url`.
fn chapter_of(image: &str) -> String {
    image.split('/').nth(3).unwrap_or_default().to_string()
}

#[derive(Default)]
pub struct FakeWeb {
    chapters: HashMap<String, Vec<String>>,
    /// Chapter pages answering 404.
    pub missing_chapters: HashSet<String>,
    /// Every request fails with a connection error.
    pub offline: bool,
    pub delay: Duration,
    discovered: Mutex<Vec<String>>,
    image_gets: Mutex<Vec<String>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: Mutex<HashMap<String, usize>>,
}

impl FakeWeb {
    pub fn with_chapters(n: usize, images: usize) -> Self {
        let mut web = FakeWeb::default();
        for c in 1..=n {
            web.chapters
                .insert(chapter_url(c), (1..=images).map(|i| image_url(c, i)).collect());
        }
        web
    }

    /// Chapter pages whose images were requested, sorted.
    pub fn discovered(&self) -> Vec<String> {
        let mut out = self.discovered.lock().unwrap().clone();
        out.sort();
        out.dedup();
        out
    }

    pub fn image_gets(&self) -> usize {
        self.image_gets.lock().unwrap().len()
    }

    /// Highest number of concurrent image requests seen within any one chapter.
    pub fn max_in_flight_per_chapter(&self) -> usize {
        self.max_in_flight.lock().unwrap().values().copied().max().unwrap_or(0)
    }

    fn enter(&self, chapter: &str) {
        let mut cur = self.in_flight.lock().unwrap();
        let n = cur.entry(chapter.to_string()).or_default();
        *n += 1;
        let mut max = self.max_in_flight.lock().unwrap();
        let m = max.entry(chapter.to_string()).or_default();
        *m = (*m).max(*n);
    }

    fn leave(&self, chapter: &str) {
        if let Some(n) = self.in_flight.lock().unwrap().get_mut(chapter) {
            *n -= 1;
        }
    }
}

struct FakeClient(Arc<FakeWeb>);

#[async_trait]
impl HttpClient for FakeClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let web = &self.0;
        if web.offline {
            return Err(FetchError::transport(ErrorKind::Connection, "could not connect"));
        }
        let chapter = chapter_of(url);
        web.enter(&chapter);
        tokio::time::sleep(web.delay).await;
        web.leave(&chapter);
        web.image_gets.lock().unwrap().push(url.to_string());
        Ok(format!("png bytes of {url}").into_bytes())
    }
}

pub struct FakeFactory(pub Arc<FakeWeb>);

impl HttpClientFactory for FakeFactory {
    fn client(&self, _proxy: Option<&str>, _ua: Option<&str>) -> Arc<dyn HttpClient> {
        Arc::new(FakeClient(Arc::clone(&self.0)))
    }
}

pub struct FakeScraper(pub Arc<FakeWeb>);

#[async_trait]
impl Scraper for FakeScraper {
    async fn find_image_urls(&self, _c: &dyn HttpClient, url: &str) -> Result<Vec<String>, FetchError> {
        let web = &self.0;
        if web.offline {
            return Err(FetchError::transport(ErrorKind::Connection, "could not connect"));
        }
        web.discovered.lock().unwrap().push(url.to_string());
        if web.missing_chapters.contains(url) {
            return Err(FetchError::Http(404));
        }
        Ok(web.chapters.get(url).cloned().unwrap_or_default())
    }

    async fn find_chapters(&self, _c: &dyn HttpClient, _url: &str) -> Result<Vec<ChapterLink>, FetchError> {
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub web: Arc<FakeWeb>,
    pub runner: JobRunner,
    pub store: OperationStore,
    pub cache: ChapterCache,
    pub bus: StatusBus,
    pub output: TempDir,
    pub cache_dir: TempDir,
    _state: TempDir,
}

pub async fn harness(web: FakeWeb) -> Harness {
    let web = Arc::new(web);
    let state = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let store = OperationStore::open_at(state.path().join("jobs.db")).await.unwrap();
    let cache = ChapterCache::new(cache_dir.path());
    let bus = StatusBus::new(4096);
    let engine = FetchEngine::new(
        Arc::new(FakeFactory(Arc::clone(&web))),
        Arc::new(FakeScraper(Arc::clone(&web))),
    )
    .with_retry(RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    });
    let runner = JobRunner::new(
        engine,
        store.clone(),
        cache.clone(),
        bus.clone(),
        LiveSettings::new(4, 10, Vec::new()),
    );
    Harness {
        web,
        runner,
        store,
        cache,
        bus,
        output,
        cache_dir,
        _state: state,
    }
}

impl Harness {
    /// Job for chapters `1..=n` of `SERIES_URL`, placed into the output dir.
    pub fn operation(&self, job_id: &str, n: usize) -> QueuedOperation {
        operation_for(job_id, SERIES_URL, n, self.output.path())
    }

    /// Lay down chapter `c` of `op` as a finished cache folder.
    pub async fn seed_complete(&self, op: &QueuedOperation, c: usize) -> PathBuf {
        let folders = assign_chapter_folders(op.chapters.iter().map(|ch| (ch.url.as_str(), ch.title.as_str())));
        let slug = op.source_slug();
        let dir = self
            .cache
            .write_source_marker(&slug, &op.series_url, &op.display_title())
            .await
            .unwrap()
            .join(&folders[c - 1]);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page_001.png"), b"cached page").unwrap();
        self.cache.mark_complete(&slug, &folders[c - 1], 1).await.unwrap();
        dir
    }

    pub fn archive_path(&self, op: &QueuedOperation) -> PathBuf {
        self.output.path().join(op.archive_file_name())
    }

    pub fn work_dir(&self, op: &QueuedOperation) -> PathBuf {
        self.cache.source_dir(&op.source_slug())
    }
}

pub fn operation_for(job_id: &str, series_url: &str, n: usize, output: &Path) -> QueuedOperation {
    QueuedOperation {
        job_id: job_id.to_string(),
        series_url: series_url.to_string(),
        custom_title: String::new(),
        chapters: (1..=n)
            .map(|c| Chapter::from_web(format!("{series_url}chapter-{c}/"), format!("Chapter {c}")))
            .collect(),
        workers: 0,
        output_format: OutputFormat::Cbz,
        output_path: output.to_string_lossy().into_owned(),
        user_agents: Vec::new(),
        allow_nsfw: false,
        series_metadata: None,
        archive_name: None,
    }
}

/// Every update buffered so far.
pub fn drain(sub: &mut StatusSubscription) -> Vec<JobStatusUpdate> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

/// Files under `dir` (recursively) whose name ends in `.part`.
pub fn part_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(part_files(&path));
        } else if path.to_string_lossy().ends_with(".part") {
            out.push(path);
        }
    }
    out
}

/// Chapter folders under a work dir and whether each carries its completion marker.
pub fn chapter_folders(work_dir: &Path) -> Vec<(String, bool)> {
    let mut out: Vec<(String, bool)> = std::fs::read_dir(work_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().is_dir())
                .map(|e| {
                    (
                        e.file_name().to_string_lossy().into_owned(),
                        e.path().join(COMPLETE_MARKER).exists(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    out.sort();
    out
}
