//! URL modeling and name derivation.
//!
//! Derives the deterministic identifiers the engine keys on: the source slug
//! (on-disk cache directory and metadata-store key) and the per-chapter cache
//! folder names.

mod path;
mod sanitize;

pub use path::{chapter_slug_from_url, filename_from_url_path, image_extension, title_from_series_url};
pub use sanitize::sanitize_component;

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Folder name used when a title sanitizes to nothing.
const DEFAULT_CHAPTER_FOLDER: &str = "chapter";

/// First `len` hex chars of SHA-256 over `input`.
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut h = hex::encode(digest);
    h.truncate(len);
    h
}

/// Canonical form of a series URL: parsed (lowercased scheme/host), no fragment,
/// no trailing slash.
fn canonical_series_url(series_url: &str) -> String {
    match url::Url::parse(series_url.trim()) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => series_url.trim().trim_end_matches('/').to_string(),
    }
}

/// Deterministic cache slug for a content source.
///
/// Readable prefix from the last URL path segment plus a hash of the canonical
/// URL, so two series with the same trailing segment on different sites never
/// share a cache directory.
///
/// - `source_slug("https://example.com/manga/solo-hiker/")` → `"solo-hiker-<10 hex>"`
pub fn source_slug(series_url: &str) -> String {
    let canonical = canonical_series_url(series_url);
    let readable = filename_from_url_path(&canonical)
        .or_else(|| url::Url::parse(&canonical).ok().and_then(|u| u.host_str().map(str::to_string)))
        .map(|s| sanitize_component(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "source".to_string());
    format!("{}-{}", readable, short_hash(&canonical, 10))
}

/// Cache folder name for a single chapter title.
pub fn chapter_folder_name(title: &str) -> String {
    let s = sanitize_component(title);
    if s.is_empty() || s == "." || s == ".." {
        DEFAULT_CHAPTER_FOLDER.to_string()
    } else {
        s
    }
}

/// Folder names for a job's chapters, given as `(url, title)` in job order.
///
/// Chapters whose sanitized titles collide all get a `-<8 hex of url>` suffix,
/// so no two chapters in one job share a folder. Names only depend on the
/// chapter list, so a re-run of the same job lands in the same folders.
pub fn assign_chapter_folders<'a, I>(chapters: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    assign_chapter_folders_keeping(chapters, |_| false)
}

/// Like [`assign_chapter_folders`], but a colliding name for which `keep`
/// returns true stays with the first chapter carrying it in job order.
///
/// Used against cache status: a folder already complete under its plain name
/// keeps that name when the site later adds a chapter whose title sanitizes
/// to the same thing. Only the newcomers are suffixed.
pub fn assign_chapter_folders_keeping<'a, I, F>(chapters: I, keep: F) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
    F: Fn(&str) -> bool,
{
    let pairs: Vec<(&str, String)> = chapters
        .into_iter()
        .map(|(url, title)| (url, chapter_folder_name(title)))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, name) in &pairs {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    let mut kept: HashSet<&str> = HashSet::new();
    pairs
        .iter()
        .map(|(url, name)| {
            if counts.get(name.as_str()).copied().unwrap_or(0) <= 1 {
                return name.clone();
            }
            if keep(name) && kept.insert(name.as_str()) {
                return name.clone();
            }
            format!("{}-{}", name, short_hash(url, 8))
        })
        .collect()
}
