//! On-disk chapter cache and the cache status resolver.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/<source-slug>/.source.json          source identity marker
//! <root>/<source-slug>/<chapter-folder>/     one folder per chapter
//! <root>/<source-slug>/<chapter-folder>/.complete
//! ```
//!
//! A chapter counts as materialized only when its `.complete` marker exists;
//! the marker is written after every page has been renamed into place. The
//! source directory doubles as the job's temp working directory, so a
//! resumed job with the same source finds its earlier chapters here.

mod markers;

pub use markers::{
    chapter_images, is_chapter_complete, mark_chapter_complete, SourceMarker, COMPLETE_MARKER,
    SOURCE_MARKER,
};

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Handle to the cache root. Cheap to clone; holds no state besides the path.
#[derive(Debug, Clone)]
pub struct ChapterCache {
    root: PathBuf,
}

impl ChapterCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory of one content source.
    pub fn source_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    /// Cache status of every chapter folder of `slug`: folder name → fully materialized.
    ///
    /// Reads the filesystem at call time. A missing source directory yields an empty map.
    pub async fn chapter_status(&self, slug: &str) -> Result<BTreeMap<String, bool>> {
        let dir = self.source_dir(slug);
        let mut out = BTreeMap::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let complete = is_chapter_complete(&entry.path()).await;
            out.insert(name, complete);
        }
        Ok(out)
    }

    /// Create the source directory and (re)write its identity marker.
    pub async fn write_source_marker(&self, slug: &str, series_url: &str, title: &str) -> Result<PathBuf> {
        let dir = self.source_dir(slug);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;
        let marker = SourceMarker::new(slug, series_url, title);
        let json = serde_json::to_vec_pretty(&marker)?;
        crate::storage::write_atomic(&dir.join(SOURCE_MARKER), &json).await?;
        Ok(dir)
    }

    pub async fn read_source_marker(&self, slug: &str) -> Result<Option<SourceMarker>> {
        let path = self.source_dir(slug).join(SOURCE_MARKER);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let marker = serde_json::from_slice(&bytes)
                    .with_context(|| format!("malformed {}", path.display()))?;
                Ok(Some(marker))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    /// Every source directory that carries a readable identity marker, sorted by slug.
    pub async fn list_sources(&self) -> Result<Vec<SourceMarker>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", self.root.display())),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let slug = entry.file_name().to_string_lossy().into_owned();
            match self.read_source_marker(&slug).await {
                Ok(Some(marker)) => out.push(marker),
                Ok(None) => {}
                Err(e) => tracing::debug!(slug = %slug, "skipping cache dir: {e:#}"),
            }
        }
        out.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(out)
    }

    /// Mark `slug/folder` as fully materialized with `pages` images.
    pub async fn mark_complete(&self, slug: &str, folder: &str, pages: usize) -> Result<()> {
        mark_chapter_complete(&self.source_dir(slug).join(folder), pages).await
    }

    /// Delete a source directory and everything in it. Missing is not an error.
    pub async fn remove_source(&self, slug: &str) -> Result<()> {
        let dir = self.source_dir(slug);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", dir.display())),
        }
    }
}
