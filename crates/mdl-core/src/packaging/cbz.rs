//! CBZ: a zip of `<chapter-folder>/<page>` entries plus `ComicInfo.xml`.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use super::{
    clean_chapter_title, collect_pages, comic_info_xml, dir_name, missing_summary, write_via_temp,
    ArchiveSummary, ChapterFolder, Packager,
};
use crate::model::{FailureReason, OutputFormat};

/// Name of the metadata entry at the archive root.
pub const COMIC_INFO: &str = "ComicInfo.xml";

#[derive(Debug, Clone, Copy, Default)]
pub struct CbzPackager;

impl Packager for CbzPackager {
    fn format(&self) -> OutputFormat {
        OutputFormat::Cbz
    }

    fn create_archive(
        &self,
        title: &str,
        chapters: &[ChapterFolder],
        output: &Path,
        source_url: &str,
        failed: &BTreeMap<String, Vec<FailureReason>>,
    ) -> Result<ArchiveSummary> {
        let chapters = collect_pages(chapters)?;
        let mut bookmarks = Vec::with_capacity(chapters.len());
        let mut page = 0usize;
        for (ch, pages) in &chapters {
            bookmarks.push((page, clean_chapter_title(&ch.title)));
            page += pages.len();
        }
        let notes = missing_summary(failed);
        let xml = comic_info_xml(title, &bookmarks, page, source_url, notes.as_deref());

        write_via_temp(output, |file| {
            let mut zip = zip::ZipWriter::new(file);
            let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            // Images are already compressed.
            let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

            zip.start_file(COMIC_INFO, deflated)?;
            zip.write_all(xml.as_bytes())?;
            for (ch, pages) in &chapters {
                let folder = dir_name(&ch.dir);
                for p in pages {
                    let name = format!("{folder}/{}", dir_name(p));
                    let bytes = std::fs::read(p).with_context(|| format!("read {}", p.display()))?;
                    zip.start_file(name, stored)?;
                    zip.write_all(&bytes)?;
                }
            }
            zip.finish()?;
            Ok(())
        })?;

        tracing::debug!(output = %output.display(), pages = page, "cbz written");
        Ok(ArchiveSummary {
            chapters: chapters.len(),
            pages: page,
        })
    }
}
