//! Helpers that read names out of URL paths.

/// Extracts the last path segment from a URL.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Image file extension derived from the URL path, lowercased; `jpg` when unknown.
pub fn image_extension(url: &str) -> &'static str {
    let name = filename_from_url_path(url).unwrap_or_default().to_ascii_lowercase();
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext {
        "png" => "png",
        "webp" => "webp",
        "gif" => "gif",
        "avif" => "avif",
        "jpeg" => "jpeg",
        _ => "jpg",
    }
}

/// Chapter slug as used by `--exclude`: the last non-empty path segment of the URL.
pub fn chapter_slug_from_url(url: &str) -> String {
    filename_from_url_path(url).unwrap_or_else(|| {
        url.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    })
}

/// Human title derived from a series URL: `/manga/solo-hiker/` -> `Solo Hiker`.
pub fn title_from_series_url(series_url: &str) -> String {
    let path = url::Url::parse(series_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| series_url.to_string());
    let (after, under_manga) = match path.split_once("/manga/") {
        Some((_, rest)) => (rest, true),
        None => (path.as_str(), false),
    };
    let segments: Vec<&str> = after
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with("chapter-"))
        .collect();
    let slug = if under_manga {
        segments.first()
    } else {
        segments.last()
    }
    .copied()
    .unwrap_or("untitled");
    title_case(&slug.replace(['-', '_'], " "))
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal() {
        assert_eq!(
            filename_from_url_path("https://example.com/a/b/page-01.png").as_deref(),
            Some("page-01.png")
        );
    }

    #[test]
    fn root_or_empty() {
        assert_eq!(filename_from_url_path("https://example.com/"), None);
        assert_eq!(filename_from_url_path("https://example.com"), None);
    }

    #[test]
    fn extension_from_url() {
        assert_eq!(image_extension("https://cdn.example.com/x/01.PNG?token=1"), "png");
        assert_eq!(image_extension("https://cdn.example.com/x/01.webp"), "webp");
        assert_eq!(image_extension("https://cdn.example.com/x/01"), "jpg");
        assert_eq!(image_extension("not a url"), "jpg");
    }

    #[test]
    fn chapter_slug() {
        assert_eq!(
            chapter_slug_from_url("https://example.com/manga/solo/chapter-12/"),
            "chapter-12"
        );
    }

    #[test]
    fn series_title() {
        assert_eq!(
            title_from_series_url("https://example.com/manga/the-solo-hiker/"),
            "The Solo Hiker"
        );
        assert_eq!(
            title_from_series_url("https://example.com/manga/the-solo-hiker/chapter-3/"),
            "The Solo Hiker"
        );
        assert_eq!(title_from_series_url("https://example.com/series/abc_def"), "Abc Def");
    }
}
