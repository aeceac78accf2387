//! Chapter and image discovery.
//!
//! `Scraper` is the seam the fetch engine uses to turn a chapter URL into its
//! image URLs. `WpMangaScraper` handles the common WordPress "Madara" layout:
//! chapter list items `li.wp-manga-chapter a` (newest first on the page) and
//! page images `img.wp-manga-chapter-img`.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::http::HttpClient;
use crate::retry::FetchError;
use crate::url_model::chapter_slug_from_url;

/// One chapter link found on a series page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterLink {
    pub url: String,
    pub title: String,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Image URLs of one chapter, in reading order. Duplicates are allowed; the engine dedupes.
    async fn find_image_urls(
        &self,
        client: &dyn HttpClient,
        chapter_url: &str,
    ) -> Result<Vec<String>, FetchError>;

    /// Chapters listed on a series page, oldest first.
    async fn find_chapters(
        &self,
        client: &dyn HttpClient,
        series_url: &str,
    ) -> Result<Vec<ChapterLink>, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct WpMangaScraper;

#[async_trait]
impl Scraper for WpMangaScraper {
    async fn find_image_urls(
        &self,
        client: &dyn HttpClient,
        chapter_url: &str,
    ) -> Result<Vec<String>, FetchError> {
        let body = client.get(chapter_url).await?;
        Ok(parse_image_urls(&String::from_utf8_lossy(&body), chapter_url))
    }

    async fn find_chapters(
        &self,
        client: &dyn HttpClient,
        series_url: &str,
    ) -> Result<Vec<ChapterLink>, FetchError> {
        let body = client.get(series_url).await?;
        Ok(parse_chapter_links(&String::from_utf8_lossy(&body), series_url))
    }
}

/// True when `url` points at a single chapter rather than a series page.
pub fn is_chapter_url(url: &str) -> bool {
    url.trim_end_matches('/')
        .rsplit('/')
        .take(2)
        .any(|seg| seg.starts_with("chapter-"))
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("data:") {
        return None;
    }
    match base {
        Some(b) => b.join(href).ok().map(String::from),
        None => Url::parse(href).ok().map(String::from),
    }
}

/// Chapter links in a series page, reversed to oldest first. Links without
/// text are titled by their URL slug.
pub fn parse_chapter_links(html: &str, page_url: &str) -> Vec<ChapterLink> {
    let Ok(selector) = Selector::parse("li.wp-manga-chapter a") else {
        return Vec::new();
    };
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    let mut out: Vec<ChapterLink> = Vec::new();
    for a in document.select(&selector) {
        let Some(url) = a.value().attr("href").and_then(|h| resolve(base.as_ref(), h)) else {
            continue;
        };
        if out.iter().any(|c| c.url == url) {
            continue;
        }
        let text = a.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let title = if text.is_empty() {
            chapter_slug_from_url(&url)
        } else {
            text
        };
        out.push(ChapterLink { url, title });
    }
    out.reverse();
    out
}

/// Page image URLs in a chapter page. Lazy-loaded images keep the real URL in `data-src`.
pub fn parse_image_urls(html: &str, page_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("img.wp-manga-chapter-img") else {
        return Vec::new();
    };
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|img| {
            let el = img.value();
            ["data-src", "data-lazy-src", "src"]
                .iter()
                .filter_map(|attr| el.attr(attr))
                .find_map(|v| resolve(base.as_ref(), v))
        })
        .collect()
}
