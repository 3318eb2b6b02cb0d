//! Chapter content extraction
//!
//! A chapter page must carry a title node. Content comes from the primary
//! selector, falling back to the alternate selector when the primary yields
//! fewer than [`MIN_PARAGRAPHS`] paragraphs and the alternate yields more.
//! Short bodies are replaced by the "No content found" marker rather than
//! treated as errors.

use crate::config::SiteProfile;
use crate::model::NO_CONTENT;
use crate::scrape::{element_text, parse_selector};
use crate::url::resolve_link;
use crate::HarvestError;
use scraper::{Html, Selector};
use url::Url;

/// Paragraph count below which the alternate selector is consulted and
/// bodies are considered missing
pub const MIN_PARAGRAPHS: usize = 5;

/// Extracted chapter body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterContent {
    /// Paragraphs joined with newlines, or the missing-content marker
    Text(String),

    /// Absolute page-image URLs in reading order
    Images(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedChapter {
    pub title: String,
    pub content: ChapterContent,
}

/// Extracts a chapter's title and content from its page
///
/// # Errors
///
/// * `HarvestError::Extraction` - The title node is missing
/// * `HarvestError::Config` - A configured selector does not parse
pub fn extract_chapter(
    html: &str,
    page_url: &str,
    profile: &SiteProfile,
) -> Result<ExtractedChapter, HarvestError> {
    let document = Html::parse_document(html);
    let selectors = &profile.selectors;

    let title_selector = parse_selector("chapter-title", &selectors.chapter_title)?;
    let title = document
        .select(&title_selector)
        .map(|e| element_text(&e))
        .find(|t| !t.is_empty())
        .ok_or_else(|| HarvestError::Extraction {
            url: page_url.to_string(),
            message: format!("no chapter title at '{}'", selectors.chapter_title),
        })?;

    let content_selector = parse_selector("content", &selectors.content)?;

    if profile.has_images_for_content {
        let base = Url::parse(page_url)?;
        return Ok(ExtractedChapter {
            title,
            content: ChapterContent::Images(image_refs(&document, &content_selector, &base)?),
        });
    }

    let primary = paragraphs(&document, &content_selector);
    let alternate = match &selectors.alternate_content {
        Some(alt) if primary.len() < MIN_PARAGRAPHS => {
            let alt_selector = parse_selector("alternate-content", alt)?;
            Some(paragraphs(&document, &alt_selector))
        }
        _ => None,
    };

    let chosen = choose_paragraphs(primary, alternate);
    let body = finalize_body(&chosen);
    if body == NO_CONTENT {
        tracing::debug!("No usable content at {}", page_url);
    }

    Ok(ExtractedChapter {
        title,
        content: ChapterContent::Text(body),
    })
}

/// Picks the alternate paragraphs only when the primary set is short and the
/// alternate set is strictly larger
pub fn choose_paragraphs(primary: Vec<String>, alternate: Option<Vec<String>>) -> Vec<String> {
    match alternate {
        Some(alt) if primary.len() < MIN_PARAGRAPHS && alt.len() > primary.len() => alt,
        _ => primary,
    }
}

/// Joins paragraphs with newlines, substituting the missing-content marker
/// for empty or short bodies
pub fn finalize_body(paragraphs: &[String]) -> String {
    let body = paragraphs.join("\n");
    let segments = body.lines().filter(|line| !line.trim().is_empty()).count();

    if body.trim().is_empty() || segments < MIN_PARAGRAPHS {
        NO_CONTENT.to_string()
    } else {
        body
    }
}

/// Non-empty text of every node matched by `selector`
fn paragraphs(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Image URLs under (or matched by) the content nodes; lazy-load
/// `data-src` wins over `src`
fn image_refs(document: &Html, selector: &Selector, base: &Url) -> Result<Vec<String>, HarvestError> {
    let img = parse_selector("content", "img")?;
    let mut refs = Vec::new();

    for node in document.select(selector) {
        let images: Vec<_> = if node.value().name() == "img" {
            vec![node]
        } else {
            node.select(&img).collect()
        };

        for image in images {
            let src = image
                .value()
                .attr("data-src")
                .or_else(|| image.value().attr("src"));
            if let Some(url) = src.and_then(|s| resolve_link(s, base)) {
                if !refs.contains(&url) {
                    refs.push(url);
                }
            }
        }
    }

    Ok(refs)
}
