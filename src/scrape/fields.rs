//! Field extractors for landing and table-of-contents pages
//!
//! Each field is a plain function over the parsed document and the site
//! profile. Strategies hold a [`FieldExtractors`] table and may swap
//! individual entries for sites whose markup needs special handling.

use crate::config::SiteProfile;
use crate::model::ChapterLink;
use crate::scrape::{element_text, parse_selector};
use crate::url::{query_param, resolve_link};
use crate::ConfigError;
use scraper::Html;
use std::collections::HashSet;
use url::Url;

type TextField = fn(&Html, &SiteProfile) -> Result<Option<String>, ConfigError>;
type ListField = fn(&Html, &SiteProfile) -> Result<Vec<String>, ConfigError>;
type LinkField = fn(&Html, &Url, &SiteProfile) -> Result<Option<String>, ConfigError>;
type ChapterField = fn(&Html, &Url, &SiteProfile) -> Result<Vec<ChapterLink>, ConfigError>;
type PageField = fn(&Html, &Url, &SiteProfile) -> Result<Option<u32>, ConfigError>;

/// Per-field extraction functions
#[derive(Clone, Copy)]
pub struct FieldExtractors {
    pub title: TextField,
    pub author: TextField,
    pub genres: ListField,
    pub description: ListField,
    pub status: TextField,
    pub thumbnail_url: LinkField,
    pub chapter_links: ChapterField,
    pub last_page: PageField,
}

impl Default for FieldExtractors {
    fn default() -> Self {
        Self {
            title,
            author,
            genres,
            description,
            status,
            thumbnail_url,
            chapter_links,
            last_page,
        }
    }
}

impl std::fmt::Debug for FieldExtractors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldExtractors").finish_non_exhaustive()
    }
}

/// First non-empty text matched by an optional selector
fn first_text(
    document: &Html,
    field: &str,
    selector: Option<&str>,
) -> Result<Option<String>, ConfigError> {
    let Some(selector) = selector else {
        return Ok(None);
    };
    let selector = parse_selector(field, selector)?;
    Ok(document
        .select(&selector)
        .map(|e| element_text(&e))
        .find(|t| !t.is_empty()))
}

/// Every non-empty text matched by an optional selector
fn all_text(
    document: &Html,
    field: &str,
    selector: Option<&str>,
) -> Result<Vec<String>, ConfigError> {
    let Some(selector) = selector else {
        return Ok(Vec::new());
    };
    let selector = parse_selector(field, selector)?;
    Ok(document
        .select(&selector)
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty())
        .collect())
}

fn title(document: &Html, profile: &SiteProfile) -> Result<Option<String>, ConfigError> {
    first_text(document, "title", Some(&profile.selectors.title))
}

fn author(document: &Html, profile: &SiteProfile) -> Result<Option<String>, ConfigError> {
    first_text(document, "author", profile.selectors.author.as_deref())
}

fn genres(document: &Html, profile: &SiteProfile) -> Result<Vec<String>, ConfigError> {
    let mut seen = HashSet::new();
    Ok(all_text(document, "genres", profile.selectors.genres.as_deref())?
        .into_iter()
        .filter(|genre| seen.insert(genre.to_lowercase()))
        .collect())
}

fn description(document: &Html, profile: &SiteProfile) -> Result<Vec<String>, ConfigError> {
    all_text(document, "description", profile.selectors.description.as_deref())
}

fn status(document: &Html, profile: &SiteProfile) -> Result<Option<String>, ConfigError> {
    first_text(document, "status", profile.selectors.status.as_deref())
}

/// Cover image URL; lazy-load `data-src` wins over `src`
fn thumbnail_url(
    document: &Html,
    base: &Url,
    profile: &SiteProfile,
) -> Result<Option<String>, ConfigError> {
    let Some(selector) = profile.selectors.thumbnail.as_deref() else {
        return Ok(None);
    };
    let selector = parse_selector("thumbnail", selector)?;
    Ok(document.select(&selector).find_map(|e| {
        let value = e.value();
        value
            .attr("data-src")
            .or_else(|| value.attr("src"))
            .and_then(|src| resolve_link(src, base))
    }))
}

/// Chapter links in document order with their link text as title
fn chapter_links(
    document: &Html,
    base: &Url,
    profile: &SiteProfile,
) -> Result<Vec<ChapterLink>, ConfigError> {
    let selector = parse_selector("chapter-links", &profile.selectors.chapter_links)?;
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(url) = resolve_link(href, base) {
            let text = element_text(&element);
            let title = if text.is_empty() {
                element.value().attr("title").unwrap_or_default().to_string()
            } else {
                text
            };
            links.push(ChapterLink { url, title });
        }
    }

    Ok(links)
}

/// Highest table-of-contents page number, before the profile offset
///
/// Reads the configured attribute of the last-page node (optionally a query
/// parameter inside it), falling back to the node's text.
fn last_page(
    document: &Html,
    base: &Url,
    profile: &SiteProfile,
) -> Result<Option<u32>, ConfigError> {
    let Some(selector) = profile.selectors.last_page.as_deref() else {
        return Ok(None);
    };
    let selector = parse_selector("last-page", selector)?;
    let Some(node) = document.select(&selector).last() else {
        return Ok(None);
    };

    let raw = match profile.last_page_attribute.as_deref() {
        Some(attribute) => {
            let value = node.value().attr(attribute).unwrap_or_default();
            match profile.last_page_query_param.as_deref() {
                Some(param) => query_param(value, base, param),
                None => Some(value.to_string()),
            }
        }
        None => Some(element_text(&node)),
    };

    Ok(raw.and_then(|r| parse_page_number(&r)))
}

/// Parses the first run of digits, tolerating labels such as "Page 12"
fn parse_page_number(raw: &str) -> Option<u32> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
