//! Minimal fixed-layout EPUB 3: one XHTML page per image, nav with chapter entries.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use super::{
    clean_chapter_title, collect_pages, missing_summary, write_via_temp, xml_escape,
    ArchiveSummary, ChapterFolder, Packager,
};
use crate::model::{FailureReason, OutputFormat};

#[derive(Debug, Clone, Copy, Default)]
pub struct EpubPackager;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

fn media_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        _ => "image/jpeg",
    }
}

struct PageEntry {
    id: String,
    image_href: String,
    image_media: &'static str,
    page_href: String,
}

impl Packager for EpubPackager {
    fn format(&self) -> OutputFormat {
        OutputFormat::Epub
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

        let mut entries: Vec<(PageEntry, &Path)> = Vec::new();
        let mut toc: Vec<(String, String)> = Vec::new();
        for (ci, (ch, pages)) in chapters.iter().enumerate() {
            for (pi, p) in pages.iter().enumerate() {
                let n = entries.len() + 1;
                let ext = p
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_else(|| "jpg".to_string());
                let entry = PageEntry {
                    id: format!("p{n:05}"),
                    image_href: format!("images/c{:03}_{:03}.{ext}", ci + 1, pi + 1),
                    image_media: media_type(&ext),
                    page_href: format!("pages/p{n:05}.xhtml"),
                };
                if pi == 0 {
                    toc.push((clean_chapter_title(&ch.title), entry.page_href.clone()));
                }
                entries.push((entry, p.as_path()));
            }
        }
        let page_count = entries.len();

        let identifier = format!("urn:mdl:{}", crate::url_model::short_hash(source_url, 16));
        let opf = content_opf(title, &identifier, &entries);
        let nav = nav_xhtml(title, &toc, missing_summary(failed).as_deref(), failed);

        write_via_temp(output, |file| {
            let mut zip = zip::ZipWriter::new(file);
            let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            // `mimetype` must be the first entry and uncompressed.
            zip.start_file("mimetype", stored)?;
            zip.write_all(b"application/epub+zip")?;
            zip.start_file("META-INF/container.xml", deflated)?;
            zip.write_all(CONTAINER_XML.as_bytes())?;
            zip.start_file("OEBPS/content.opf", deflated)?;
            zip.write_all(opf.as_bytes())?;
            zip.start_file("OEBPS/nav.xhtml", deflated)?;
            zip.write_all(nav.as_bytes())?;
            for (entry, src) in &entries {
                zip.start_file(format!("OEBPS/{}", entry.page_href), deflated)?;
                zip.write_all(page_xhtml(title, &entry.image_href).as_bytes())?;
                let bytes = std::fs::read(src).with_context(|| format!("read {}", src.display()))?;
                zip.start_file(format!("OEBPS/{}", entry.image_href), stored)?;
                zip.write_all(&bytes)?;
            }
            zip.finish()?;
            Ok(())
        })?;

        tracing::debug!(output = %output.display(), pages = page_count, "epub written");
        Ok(ArchiveSummary {
            chapters: chapters.len(),
            pages: page_count,
        })
    }
}

fn content_opf(title: &str, identifier: &str, entries: &[(PageEntry, &Path)]) -> String {
    let mut manifest = String::from(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    let mut spine = String::new();
    for (i, (e, _)) in entries.iter().enumerate() {
        let cover = if i == 0 { " properties=\"cover-image\"" } else { "" };
        manifest.push_str(&format!(
            "    <item id=\"{id}\" href=\"{href}\" media-type=\"application/xhtml+xml\"/>\n    \
             <item id=\"{id}-img\" href=\"{img}\" media-type=\"{media}\"{cover}/>\n",
            id = e.id,
            href = e.page_href,
            img = e.image_href,
            media = e.image_media,
        ));
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", e.id));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="bookid">{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>en</dc:language>
    <meta property="dcterms:modified">{modified}</meta>
    <meta property="rendition:layout">pre-paginated</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
{spine}  </spine>
</package>
"#,
        identifier = xml_escape(identifier),
        title = xml_escape(title),
        modified = utc_timestamp(crate::store::unix_timestamp()),
    )
}

fn nav_xhtml(
    title: &str,
    toc: &[(String, String)],
    missing: Option<&str>,
    failed: &BTreeMap<String, Vec<FailureReason>>,
) -> String {
    let mut items = String::new();
    for (name, href) in toc {
        items.push_str(&format!(
            "      <li><a href=\"{href}\">{}</a></li>\n",
            xml_escape(name)
        ));
    }
    let mut missing_block = String::new();
    if let Some(summary) = missing {
        missing_block.push_str(&format!("    <p>{}</p>\n    <ul>\n", xml_escape(summary)));
        for (chapter, reasons) in failed {
            let why = reasons.first().map(|r| r.message.as_str()).unwrap_or("");
            missing_block.push_str(&format!(
                "      <li>{}: {}</li>\n",
                xml_escape(chapter),
                xml_escape(why)
            ));
        }
        missing_block.push_str("    </ul>\n");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{title}</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{items}    </ol>
  </nav>
{missing_block}</body>
</html>
"#,
        title = xml_escape(title),
    )
}

fn page_xhtml(title: &str, image_href: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{}</title><style>body{{margin:0}}img{{max-width:100%;height:auto}}</style></head>
<body><img src="../{}" alt=""/></body>
</html>
"#,
        xml_escape(title),
        image_href
    )
}

/// `YYYY-MM-DDThh:mm:ssZ` for Unix seconds (proleptic Gregorian, UTC).
fn utc_timestamp(secs: i64) -> String {
    let days = secs.div_euclid(86_400);
    let rem = secs.rem_euclid(86_400);
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    // Days-from-civil inverse (Hinnant).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let mo = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + i64::from(mo <= 2);
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{m:02}:{s:02}Z")
}
