// URL construction and post-link parsing for the target site.

/// Search-results URL for a keyword, path-escaped.
pub fn search_url(site_base: &str, keyword: &str) -> String {
    format!(
        "{}/tag/{}",
        site_base.trim_end_matches('/'),
        urlencoding::encode(keyword)
    )
}

/// Canonical post URL. Empty when either part is missing.
pub fn post_url(site_base: &str, username: &str, code: &str) -> String {
    if username.is_empty() || code.is_empty() {
        return String::new();
    }
    format!("{}/@{username}/post/{code}", site_base.trim_end_matches('/'))
}

/// Resolve a raw href against the site base, returning an absolute URL with
/// fragment stripped. `None` for hrefs that are not http(s).
pub fn absolutize(site_base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut parsed = if href.starts_with("http://") || href.starts_with("https://") {
        url::Url::parse(href).ok()?
    } else {
        url::Url::parse(site_base).ok()?.join(href).ok()?
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Post code from a post URL: the path segment following `post`.
pub fn post_code(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    segments.find(|s| *s == "post")?;
    segments
        .next()
        .filter(|code| !code.is_empty())
        .map(String::from)
}
