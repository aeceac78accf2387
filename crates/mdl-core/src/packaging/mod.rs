//! Archive packaging: chapter folders to one CBZ or EPUB file.
//!
//! Packagers are synchronous (zip I/O); the runner calls them on the
//! blocking pool. Every packager writes to `<output>.part` and renames, so a
//! failed or interrupted packaging step never leaves a truncated archive.
//! Failed chapters are recorded inside the archive so a later pass can tell
//! what is missing.

mod cbz;
mod comic_info;
mod epub;
mod import;

pub use cbz::CbzPackager;
pub use comic_info::comic_info_xml;
pub use epub::EpubPackager;
pub use import::{apply_seeded_folders, seed_cache_from_archive};

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{FailureReason, OutputFormat};

/// One chapter to package: display title plus its folder of page images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterFolder {
    pub title: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub chapters: usize,
    pub pages: usize,
}

pub trait Packager: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Write one archive at `output` from `chapters` (in reading order).
    ///
    /// Chapters with no images are skipped. Zero images overall is an error.
    fn create_archive(
        &self,
        title: &str,
        chapters: &[ChapterFolder],
        output: &Path,
        source_url: &str,
        failed: &BTreeMap<String, Vec<FailureReason>>,
    ) -> Result<ArchiveSummary>;
}

pub fn packager_for(format: OutputFormat) -> Arc<dyn Packager> {
    match format {
        OutputFormat::Cbz => Arc::new(CbzPackager),
        OutputFormat::Epub => Arc::new(EpubPackager),
    }
}

/// Bookmark title from a chapter title or folder name: `chapter-12_extra` -> `Chapter 12 Extra`.
pub fn clean_chapter_title(raw: &str) -> String {
    raw.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Chapters paired with their sorted page images; empty chapters dropped.
pub(crate) fn collect_pages(chapters: &[ChapterFolder]) -> Result<Vec<(&ChapterFolder, Vec<PathBuf>)>> {
    let mut out = Vec::new();
    for ch in chapters {
        if !ch.dir.is_dir() {
            tracing::debug!(dir = %ch.dir.display(), "chapter folder missing, skipped");
            continue;
        }
        let pages = crate::cache::chapter_images(&ch.dir)?;
        if !pages.is_empty() {
            out.push((ch, pages));
        }
    }
    let total: usize = out.iter().map(|(_, p)| p.len()).sum();
    if total == 0 {
        anyhow::bail!("no images to package");
    }
    Ok(out)
}

/// Human summary of missing chapters, used in archive metadata.
pub(crate) fn missing_summary(failed: &BTreeMap<String, Vec<FailureReason>>) -> Option<String> {
    if failed.is_empty() {
        return None;
    }
    let titles: Vec<&str> = failed.keys().map(String::as_str).collect();
    Some(format!("Missing chapters: {}", titles.join(", ")))
}

/// Escape text for XML content and attribute values.
pub(crate) fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && c != '\n' && c != '\t' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Run `write` against `<output>.part`, then rename onto `output`.
pub(crate) fn write_via_temp<F>(output: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tp = crate::storage::temp_path(output);
    let file = File::create(&tp).with_context(|| format!("create {}", tp.display()))?;
    if let Err(e) = write(file) {
        let _ = std::fs::remove_file(&tp);
        return Err(e);
    }
    std::fs::rename(&tp, output)
        .with_context(|| format!("rename {} to {}", tp.display(), output.display()))?;
    Ok(())
}

/// Name of a folder (last path component) as a string.
pub(crate) fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chapter".to_string())
}
