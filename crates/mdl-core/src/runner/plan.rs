//! Partitioning a job's chapters against the cache.

use std::collections::BTreeMap;
use std::path::Path;

use crate::fetch::ChapterRequest;
use crate::model::{ChapterSource, QueuedOperation};
use crate::packaging::ChapterFolder;
use crate::url_model::assign_chapter_folders_keeping;

/// What one run has to do.
#[derive(Debug, Default)]
pub(crate) struct RunPlan {
    /// Every selected chapter in job order; the archive is built from these.
    pub package: Vec<ChapterFolder>,
    /// Chapters missing from the cache that can be fetched from the web.
    pub to_fetch: Vec<ChapterRequest>,
    /// URLs of chapters already fully materialized in the cache.
    pub already_complete: Vec<String>,
    /// Chapters neither cached nor fetchable: `(title, selected source)`.
    pub unavailable: Vec<(String, ChapterSource)>,
}

impl RunPlan {
    pub(crate) fn total(&self) -> usize {
        self.package.len()
    }
}

/// Split `op.chapters` using a fresh cache status map (folder → complete).
///
/// A complete folder keeps its name when a later chapter's title collides
/// with it, so chapters finished by an earlier run are never fetched again.
/// Chapters with no selected source are excluded. A chapter's folder is its
/// `local_slug` when it came from a local archive, else its assigned folder.
pub(crate) fn plan_run(op: &QueuedOperation, status: &BTreeMap<String, bool>, work_dir: &Path) -> RunPlan {
    let folders = assign_chapter_folders_keeping(
        op.chapters.iter().map(|c| (c.url.as_str(), c.title.as_str())),
        |name| status.get(name).copied().unwrap_or(false),
    );
    let mut plan = RunPlan::default();
    for (chapter, assigned) in op.chapters.iter().zip(folders) {
        let Some(source) = chapter.selected_source else {
            continue;
        };
        let folder = chapter
            .local_slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or(assigned);
        plan.package.push(ChapterFolder {
            title: chapter.title.clone(),
            dir: work_dir.join(&folder),
        });
        if status.get(&folder).copied().unwrap_or(false) {
            plan.already_complete.push(chapter.url.clone());
        } else if source == ChapterSource::Web {
            plan.to_fetch.push(ChapterRequest {
                url: chapter.url.clone(),
                title: chapter.title.clone(),
                folder,
            });
        } else {
            plan.unavailable.push((chapter.title.clone(), source));
        }
    }
    plan
}
