//! Job description (`QueuedOperation`) and its chapters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::url_model;

/// Where a chapter's content can be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterSource {
    Local,
    Cache,
    Web,
}

/// One chapter of a series as tracked by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub url: String,
    pub title: String,
    /// Grows monotonically as sources are confirmed (a finished web download adds `Cache`).
    #[serde(default)]
    pub available_sources: BTreeSet<ChapterSource>,
    #[serde(default)]
    pub selected_source: Option<ChapterSource>,
    /// Folder name inside the source cache when the chapter came from a local archive.
    #[serde(default)]
    pub local_slug: Option<String>,
    #[serde(default)]
    pub is_retry: bool,
    #[serde(default)]
    pub is_broken: bool,
}

impl Chapter {
    /// A chapter discovered on the web and selected for download.
    pub fn from_web(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            available_sources: BTreeSet::from([ChapterSource::Web]),
            selected_source: Some(ChapterSource::Web),
            local_slug: None,
            is_retry: false,
            is_broken: false,
        }
    }

    /// Record a finished download: the chapter is now in the cache.
    pub fn mark_cached(&mut self) {
        self.available_sources.insert(ChapterSource::Cache);
        self.is_broken = false;
        self.is_retry = false;
    }

    /// Record a failed download so a later pass knows to retry it.
    pub fn mark_broken(&mut self) {
        self.is_broken = true;
    }
}

/// Archive format produced by packaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Cbz,
    Epub,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Cbz => "cbz",
            OutputFormat::Epub => "epub",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cbz" => Ok(OutputFormat::Cbz),
            "epub" => Ok(OutputFormat::Epub),
            other => Err(anyhow::anyhow!("unknown output format: {other}")),
        }
    }
}

/// Declarative description of a download job, persisted for resume.
///
/// Immutable once a run starts, except for the per-chapter source flags which
/// the runner updates and re-persists after each chapter completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub job_id: String,
    pub series_url: String,
    #[serde(default)]
    pub custom_title: String,
    pub chapters: Vec<Chapter>,
    /// Image-level worker count for this job (per active chapter).
    pub workers: usize,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Destination directory (or opaque destination identifier) for the archive.
    pub output_path: String,
    #[serde(default)]
    pub user_agents: Vec<String>,
    #[serde(default)]
    pub allow_nsfw: bool,
    #[serde(default)]
    pub series_metadata: Option<Vec<u8>>,
    /// Archive file name to use instead of the one derived from the title
    /// (updating an existing archive in place).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_name: Option<String>,
}

impl QueuedOperation {
    /// Deterministic on-disk identity of the content source (see `url_model::source_slug`).
    pub fn source_slug(&self) -> String {
        url_model::source_slug(&self.series_url)
    }

    /// Metadata-store key. Derived from the source identity, never from `job_id`,
    /// so a record can be found again after a restart.
    pub fn location_key(&self) -> String {
        self.source_slug()
    }

    /// Title used for the archive: the custom title, or one derived from the series URL.
    pub fn display_title(&self) -> String {
        let custom = self.custom_title.trim();
        if !custom.is_empty() {
            return custom.to_string();
        }
        url_model::title_from_series_url(&self.series_url)
    }

    /// Archive file name: the explicit one if set, else sanitized title plus the format's extension.
    pub fn archive_file_name(&self) -> String {
        if let Some(name) = self
            .archive_name
            .as_deref()
            .and_then(|n| std::path::Path::new(n.trim()).file_name())
        {
            return name.to_string_lossy().into_owned();
        }
        format!(
            "{}.{}",
            url_model::sanitize_component(&self.display_title()),
            self.output_format.extension()
        )
    }

    pub fn chapter_mut(&mut self, url: &str) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.url == url)
    }
}
