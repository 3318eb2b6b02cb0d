use url::Url;

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

/// Formats a table-of-contents page URL from a pagination template
///
/// `{url}` is replaced by the novel URL without a trailing slash and `{page}`
/// by the page number.
///
/// # Examples
///
/// ```
/// use serial_harvest::url::format_page_url;
///
/// assert_eq!(
///     format_page_url("{url}/page/{page}", "https://example.com/novel/", 3),
///     "https://example.com/novel/page/3"
/// );
/// ```
pub fn format_page_url(template: &str, novel_url: &str, page: u32) -> String {
    template
        .replace("{url}", novel_url.trim_end_matches('/'))
        .replace("{page}", &page.to_string())
}

/// Reads a query parameter from an absolute or relative link
pub fn query_param(href: &str, base_url: &Url, name: &str) -> Option<String> {
    let url = base_url.join(href.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/novel/12").unwrap()
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_link("/chapter/1", &base_url()),
            Some("https://example.com/chapter/1".to_string())
        );
        assert_eq!(
            resolve_link("chapter-2", &base_url()),
            Some("https://example.com/novel/chapter-2".to_string())
        );
    }

    #[test]
    fn test_resolve_excludes_special_schemes() {
        assert_eq!(resolve_link("javascript:void(0)", &base_url()), None);
        assert_eq!(resolve_link("mailto:a@b.c", &base_url()), None);
        assert_eq!(resolve_link("#comments", &base_url()), None);
        assert_eq!(resolve_link("   ", &base_url()), None);
    }

    #[test]
    fn test_format_page_url_query_style() {
        assert_eq!(
            format_page_url("{url}?page={page}", "https://example.com/novel", 13),
            "https://example.com/novel?page=13"
        );
    }

    #[test]
    fn test_query_param_from_relative_href() {
        assert_eq!(
            query_param("/novel/12?page=12&sort=asc", &base_url(), "page"),
            Some("12".to_string())
        );
        assert_eq!(query_param("/novel/12", &base_url(), "page"), None);
    }
}
