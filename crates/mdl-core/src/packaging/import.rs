//! Seeding the chapter cache from an existing archive (`--update`).
//!
//! Every folder found in the archive is unpacked into the source cache and
//! marked complete, so the runner treats it as already downloaded and only
//! the chapters missing from the archive are fetched.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::{Component, Path};

use crate::cache::COMPLETE_MARKER;
use crate::model::{ChapterSource, QueuedOperation};
use crate::url_model::{assign_chapter_folders, chapter_slug_from_url, sanitize_component};

/// Unpack the chapter folders of `archive` into `source_dir`.
///
/// Returns the folder names seeded, sorted. Root-level files (`ComicInfo.xml`),
/// hidden files and `__MACOSX` entries are ignored.
pub fn seed_cache_from_archive(archive: &Path, source_dir: &Path) -> Result<Vec<String>> {
    let file = File::open(archive).with_context(|| format!("open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a zip archive", archive.display()))?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(path) = entry.enclosed_name() else {
            continue;
        };
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let [.., parent, name] = parts.as_slice() else {
            continue;
        };
        if parts[0] == "__MACOSX" || name.starts_with('.') {
            continue;
        }
        let folder = sanitize_component(parent);
        let file_name = sanitize_component(name);
        if folder.is_empty() || file_name.is_empty() {
            continue;
        }
        let dir = source_dir.join(&folder);
        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let target = dir.join(&file_name);
        let mut out = File::create(&target).with_context(|| format!("create {}", target.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("extract {}", target.display()))?;
        *counts.entry(folder).or_default() += 1;
    }

    for (folder, pages) in &counts {
        std::fs::write(source_dir.join(folder).join(COMPLETE_MARKER), pages.to_string())?;
    }
    tracing::info!(
        archive = %archive.display(),
        chapters = counts.len(),
        "seeded cache from existing archive"
    );
    Ok(counts.into_keys().collect())
}

/// Mark the chapters of `op` whose folder was seeded from a local archive.
///
/// A chapter matches when the seeded folder equals its assigned cache folder
/// or its URL slug. Matched chapters get `local_slug` and select `Local`.
/// Returns the number matched.
pub fn apply_seeded_folders(op: &mut QueuedOperation, seeded: &[String]) -> usize {
    let seeded: HashSet<&str> = seeded.iter().map(String::as_str).collect();
    let folders = assign_chapter_folders(op.chapters.iter().map(|c| (c.url.as_str(), c.title.as_str())));
    let mut matched = 0;
    for (chapter, folder) in op.chapters.iter_mut().zip(folders) {
        let slug = sanitize_component(&chapter_slug_from_url(&chapter.url));
        let hit = if seeded.contains(folder.as_str()) {
            Some(folder)
        } else if seeded.contains(slug.as_str()) {
            Some(slug)
        } else {
            None
        };
        if let Some(local) = hit {
            chapter.local_slug = Some(local);
            chapter.available_sources.insert(ChapterSource::Local);
            chapter.selected_source = Some(ChapterSource::Local);
            matched += 1;
        }
    }
    matched
}
