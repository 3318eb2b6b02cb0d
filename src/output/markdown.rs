//! Markdown document generation
//!
//! Each novel becomes `<output-dir>/<slug>.md` with a metadata header and one
//! section per chapter. Chapter images and the cover are copied into
//! `<output-dir>/<slug>_assets/` and linked relatively.

use crate::model::{ChapterRecord, NovelRecord};
use crate::output::traits::{OutputError, OutputGenerator, OutputResult};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes one Markdown file per novel
#[derive(Debug, Clone)]
pub struct MarkdownOutput {
    output_dir: PathBuf,
}

impl MarkdownOutput {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn document_path(&self, novel: &NovelRecord) -> PathBuf {
        self.output_dir.join(format!("{}.md", slugify(&novel.title)))
    }

    fn assets_dir(&self, novel: &NovelRecord) -> PathBuf {
        self.output_dir.join(format!("{}_assets", slugify(&novel.title)))
    }

    /// Formats the chapter sections, copying images into the assets directory
    fn format_chapters(&self, novel: &NovelRecord, chapters: &[ChapterRecord]) -> OutputResult<String> {
        let mut md = String::new();
        let assets = self.assets_dir(novel);
        let assets_name = file_name(&assets);

        for chapter in chapters {
            md.push_str(&format!("## {}\n\n", chapter.title));
            md.push_str(&format!("<!-- source: {} -->\n\n", chapter.url));

            if chapter.images.is_empty() {
                for paragraph in chapter.body.lines().filter(|l| !l.trim().is_empty()) {
                    md.push_str(paragraph.trim());
                    md.push_str("\n\n");
                }
                continue;
            }

            fs::create_dir_all(&assets)?;
            for (index, image) in chapter.images.iter().enumerate() {
                let extension = image.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
                let name = format!("{:05}_{:04}.{}", saved_sequence(chapter, novel), index + 1, extension);
                fs::copy(image, assets.join(&name))?;
                md.push_str(&format!("![{} page {}]({}/{})\n\n", chapter.title, index + 1, assets_name, name));
            }
        }

        Ok(md)
    }

    fn format_header(&self, novel: &NovelRecord) -> OutputResult<String> {
        let mut md = String::new();

        md.push_str(&format!("# {}\n\n", novel.title));

        if let Some(thumbnail) = &novel.thumbnail {
            let assets = self.assets_dir(novel);
            fs::create_dir_all(&assets)?;
            fs::write(assets.join("cover.jpg"), thumbnail)?;
            md.push_str(&format!("![Cover]({}/cover.jpg)\n\n", file_name(&assets)));
        }

        if let Some(author) = &novel.author {
            md.push_str(&format!("- **Author**: {}\n", author));
        }
        if !novel.genres.is_empty() {
            md.push_str(&format!("- **Genres**: {}\n", novel.genres.join(", ")));
        }
        if let Some(status) = &novel.status {
            md.push_str(&format!("- **Status**: {}\n", status));
        }
        md.push_str(&format!("- **Source**: {}\n\n", novel.url));

        for paragraph in &novel.description {
            md.push_str(&format!("> {}\n>\n", paragraph));
        }
        if !novel.description.is_empty() {
            md.push('\n');
        }

        Ok(md)
    }
}

impl OutputGenerator for MarkdownOutput {
    fn generate(&self, novel: &NovelRecord, chapters: &[ChapterRecord]) -> OutputResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.document_path(novel);

        let mut md = self.format_header(novel)?;
        md.push_str(&self.format_chapters(novel, chapters)?);
        fs::write(&path, md)?;

        tracing::info!("Wrote {} ({} chapters)", path.display(), chapters.len());
        Ok(path)
    }

    fn update(&self, novel: &NovelRecord, chapters: &[ChapterRecord]) -> OutputResult<PathBuf> {
        let path = self.document_path(novel);
        if !path.exists() {
            return Err(OutputError::MissingDocument(path));
        }

        let md = self.format_chapters(novel, chapters)?;
        let mut file = OpenOptions::new().append(true).open(&path)?;
        file.write_all(md.as_bytes())?;

        tracing::info!("Appended {} chapters to {}", chapters.len(), path.display());
        Ok(path)
    }
}

/// Position of a chapter among all saved chapters of the novel
fn saved_sequence(chapter: &ChapterRecord, novel: &NovelRecord) -> usize {
    novel
        .chapters
        .iter()
        .find(|c| c.url == chapter.url)
        .map_or(chapter.sequence, |c| c.sequence)
}

/// File-system friendly form of a title
///
/// # Examples
///
/// ```
/// use serial_harvest::output::slugify;
///
/// assert_eq!(slugify("The Long Road: Vol. 2!"), "the-long-road-vol-2");
/// assert_eq!(slugify("???"), "untitled");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
