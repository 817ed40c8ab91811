use url::Url;

/// Resolves a product href against the page it was found on
///
/// Standard URL-join semantics apply, so protocol-relative (`//host/path`) and
/// root-relative (`/path`) forms land on the base origin.
///
/// Returns `None` when the link should not be kept:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` targets
/// - anything that is not HTTP(S) after resolution
/// - a base that is not a valid absolute URL
///
/// # Example
///
/// ```
/// use shelf_harvest::normalize::resolve_absolute_link;
///
/// let link = resolve_absolute_link("https://shop.example/search?q=tea", "/p/42");
/// assert_eq!(link.as_deref(), Some("https://shop.example/p/42"));
/// ```
pub fn resolve_absolute_link(base: &str, maybe_relative: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    join_href(&base, maybe_relative)
}

/// Same as [`resolve_absolute_link`] with an already parsed base
pub fn join_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}
