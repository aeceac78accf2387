//! Marker files and per-chapter directory helpers.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Written into a chapter folder once all its pages are on disk.
pub const COMPLETE_MARKER: &str = ".complete";

/// Written into a source directory when a job run starts.
pub const SOURCE_MARKER: &str = ".source.json";

/// Identity of the content source a cache directory belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMarker {
    pub slug: String,
    pub series_url: String,
    #[serde(default)]
    pub title: String,
    pub created_at: i64,
}

impl SourceMarker {
    pub fn new(slug: &str, series_url: &str, title: &str) -> Self {
        Self {
            slug: slug.to_string(),
            series_url: series_url.to_string(),
            title: title.to_string(),
            created_at: crate::store::unix_timestamp(),
        }
    }
}

pub async fn is_chapter_complete(chapter_dir: &Path) -> bool {
    tokio::fs::try_exists(chapter_dir.join(COMPLETE_MARKER))
        .await
        .unwrap_or(false)
}

/// Write the completion marker (page count as its content).
pub async fn mark_chapter_complete(chapter_dir: &Path, pages: usize) -> Result<()> {
    crate::storage::write_atomic(&chapter_dir.join(COMPLETE_MARKER), pages.to_string().as_bytes())
        .await
        .with_context(|| format!("mark {} complete", chapter_dir.display()))
}

/// Image files of one chapter folder, sorted by name. Markers, hidden files and
/// `.part` leftovers are skipped.
pub fn chapter_images(chapter_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(chapter_dir)
        .with_context(|| format!("read {}", chapter_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name.ends_with(crate::storage::TEMP_SUFFIX) {
            continue;
        }
        out.push(entry.path());
    }
    out.sort();
    Ok(out)
}
