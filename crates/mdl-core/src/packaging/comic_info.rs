//! `ComicInfo.xml` for CBZ archives (the de-facto schema read by comic readers).

use super::xml_escape;

/// Build `ComicInfo.xml`.
///
/// `bookmarks` are `(page_index, chapter_title)` at each chapter's first page;
/// the first bookmark is typed `FrontCover`, the rest `Story`.
pub fn comic_info_xml(
    title: &str,
    bookmarks: &[(usize, String)],
    page_count: usize,
    source_url: &str,
    notes: Option<&str>,
) -> String {
    let title = xml_escape(title);
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str(
        "<ComicInfo xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n",
    );
    xml.push_str(&format!("  <Series>{title}</Series>\n"));
    xml.push_str(&format!("  <Title>{title}</Title>\n"));
    if !source_url.is_empty() {
        xml.push_str(&format!("  <Web>{}</Web>\n", xml_escape(source_url)));
    }
    if let Some(notes) = notes {
        xml.push_str(&format!("  <Notes>{}</Notes>\n", xml_escape(notes)));
    }
    xml.push_str(&format!("  <PageCount>{page_count}</PageCount>\n"));
    xml.push_str("  <Pages>\n");
    let first = bookmarks.first().map(|(i, _)| *i);
    let mut marks = bookmarks.iter().peekable();
    for i in 0..page_count {
        match marks.next_if(|(p, _)| *p == i) {
            Some((_, name)) => {
                let kind = if Some(i) == first { "FrontCover" } else { "Story" };
                xml.push_str(&format!(
                    "    <Page Image=\"{i}\" Bookmark=\"{}\" Type=\"{kind}\" />\n",
                    xml_escape(name)
                ));
            }
            None => xml.push_str(&format!("    <Page Image=\"{i}\" />\n")),
        }
    }
    xml.push_str("  </Pages>\n");
    xml.push_str("</ComicInfo>\n");
    xml
}
