use crate::UrlError;
use url::Url;

/// Parses a string as an absolute HTTP(S) URL
///
/// # Examples
///
/// ```
/// use serial_harvest::url::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/novel/1").is_ok());
/// assert!(parse_http_url("ftp://example.com/").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(url_str.to_string()));
    }

    Ok(url)
}

/// Computes the dispatch key of a URL: lowercase scheme and host, plus the
/// port when it is not the scheme default
///
/// Site profiles and strategies are registered under this key and looked up
/// by exact match.
///
/// # Examples
///
/// ```
/// use serial_harvest::url::authority_key;
///
/// assert_eq!(
///     authority_key("https://WWW.Example.com/novel/12?page=3").unwrap(),
///     "https://www.example.com"
/// );
/// assert_eq!(
///     authority_key("http://127.0.0.1:8080/toc").unwrap(),
///     "http://127.0.0.1:8080"
/// );
/// ```
pub fn authority_key(url_str: &str) -> Result<String, UrlError> {
    let url = parse_http_url(url_str)?;
    let host = url
        .host_str()
        .ok_or_else(|| UrlError::MissingHost(url_str.to_string()))?
        .to_lowercase();

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
