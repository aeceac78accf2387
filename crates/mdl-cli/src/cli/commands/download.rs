//! `mdl download <url>` – build a job from a series or chapter page and run it.

use anyhow::{bail, Context, Result};
use mdl_core::http::{pick_user_agent, HttpClientFactory};
use mdl_core::model::{Chapter, OutputFormat, QueuedOperation};
use mdl_core::packaging::{apply_seeded_folders, seed_cache_from_archive};
use mdl_core::scraper::{is_chapter_url, Scraper, WpMangaScraper};
use mdl_core::url_model::chapter_slug_from_url;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use super::start_and_follow;
use crate::cli::app::App;

#[derive(Debug)]
pub struct DownloadArgs {
    pub url: String,
    pub title: Option<String>,
    pub exclude: Vec<String>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub workers: Option<usize>,
    pub chapter_workers: Option<usize>,
    pub update: Option<PathBuf>,
}

pub async fn run_download(app: &App, args: DownloadArgs) -> Result<()> {
    if let Some(n) = args.chapter_workers {
        app.settings.set_chapter_workers(n);
    }

    let (series_url, chapters) = if is_chapter_url(&args.url) {
        let series = series_url_of_chapter(&args.url)
            .with_context(|| format!("cannot derive series from {}", args.url))?;
        let title = chapter_title_from_url(&args.url);
        (series, vec![Chapter::from_web(args.url.clone(), title)])
    } else {
        (args.url.clone(), discover_chapters(app, &args.url).await?)
    };
    let found = chapters.len();
    let chapters = apply_exclusions(chapters, &args.exclude);
    if chapters.is_empty() {
        bail!("no chapters to download at {}", args.url);
    }
    println!(
        "Found {} chapters ({} excluded).",
        chapters.len(),
        found - chapters.len()
    );

    let mut op = QueuedOperation {
        job_id: String::new(),
        series_url,
        custom_title: args.title.unwrap_or_default(),
        chapters,
        workers: args.workers.unwrap_or(0),
        output_format: args.format,
        output_path: String::new(),
        user_agents: Vec::new(),
        allow_nsfw: false,
        series_metadata: None,
        archive_name: None,
    };
    op.job_id = new_job_id(&op.source_slug());
    let mut output = app.output_dir(args.output.clone())?;

    if let Some(existing) = &args.update {
        let work_dir = app.cache.source_dir(&op.source_slug());
        let archive = existing.clone();
        let seeded = tokio::task::spawn_blocking(move || seed_cache_from_archive(&archive, &work_dir))
            .await
            .context("seeding task failed")??;
        let matched = apply_seeded_folders(&mut op, &seeded);
        println!(
            "Reusing {matched} chapters from {} ({} folders found).",
            existing.display(),
            seeded.len()
        );
        op.archive_name = existing
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        if args.output.is_none() {
            if let Some(parent) = existing.parent().filter(|p| !p.as_os_str().is_empty()) {
                output = parent.to_path_buf();
            }
        }
    }
    op.output_path = output.to_string_lossy().into_owned();

    tracing::info!(job_id = %op.job_id, url = %op.series_url, chapters = op.chapters.len(), "download requested");
    let backend = app.backend().await?;
    start_and_follow(backend, op).await
}

async fn discover_chapters(app: &App, series_url: &str) -> Result<Vec<Chapter>> {
    let ua = pick_user_agent(&app.settings.user_agents());
    let client = app.http().client(app.cfg.proxy_url.as_deref(), ua.as_deref());
    let links = WpMangaScraper
        .find_chapters(client.as_ref(), series_url)
        .await
        .with_context(|| format!("listing chapters of {series_url}"))?;
    Ok(links
        .into_iter()
        .map(|l| Chapter::from_web(l.url, l.title))
        .collect())
}

/// Drop chapters whose URL slug is listed in `exclude`.
pub(crate) fn apply_exclusions(chapters: Vec<Chapter>, exclude: &[String]) -> Vec<Chapter> {
    if exclude.is_empty() {
        return chapters;
    }
    chapters
        .into_iter()
        .filter(|c| {
            let slug = chapter_slug_from_url(&c.url);
            !exclude.iter().any(|e| e.trim().trim_matches('/') == slug)
        })
        .collect()
}

/// `https://site/manga/x/chapter-3/p-1/` -> `https://site/manga/x/`.
pub(crate) fn series_url_of_chapter(chapter_url: &str) -> Option<String> {
    let mut url = url::Url::parse(chapter_url).ok()?;
    let segments: Vec<String> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let cut = segments.iter().position(|s| s.starts_with("chapter-"))?;
    if cut == 0 {
        return None;
    }
    url.set_path(&format!("/{}/", segments[..cut].join("/")));
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// `.../chapter-12-5/` -> `Chapter 12 5`.
pub(crate) fn chapter_title_from_url(chapter_url: &str) -> String {
    let slug = url::Url::parse(chapter_url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .find(|s| s.starts_with("chapter-"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| chapter_slug_from_url(chapter_url));
    let words = slug.replace(['-', '_'], " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Chapter".to_string(),
    }
}

fn new_job_id(slug: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{slug}-{secs}")
}
