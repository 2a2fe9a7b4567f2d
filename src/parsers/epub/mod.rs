use crate::error::Result;
use crate::model::{BookContent, BookFormat, BookMetadata, Chapter, UNKNOWN_AUTHOR, UNKNOWN_TITLE};
use crate::parsers::{ParseOptions, ParsedDocument};
use crate::text_processor::char_count;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, error, info, warn};

pub mod container;
pub mod extract;

use container::{EpubContainer, SpineItem, TocEntry};
use extract::{extract_section_text, Section};

/// Spine sections at or below this many characters are treated as cover or
/// copyright pages when there is no table of contents.
pub const SPINE_MIN_CHARS: usize = 100;

/// Parse EPUB content
///
/// An unreadable archive or package document is an error. Problems while
/// pulling text out of individual sections only shrink the chapter list.
pub fn parse_epub(content: &[u8], options: &ParseOptions) -> Result<ParsedDocument> {
    info!(bytes = content.len(), "Parsing EPUB");
    let mut container = EpubContainer::open(content)?;

    let metadata = read_metadata(&mut container);
    debug!(title = %metadata.title, author = %metadata.author, "Read EPUB metadata");

    let chapters = match extract_chapters(&mut container, options) {
        Ok(chapters) => chapters,
        Err(err) => {
            error!("Chapter extraction failed, returning no chapters: {err}");
            Vec::new()
        }
    };
    if chapters.is_empty() {
        warn!(title = %metadata.title, "No chapters extracted from EPUB");
    }

    info!(chapters = chapters.len(), "Finished parsing EPUB");
    Ok(ParsedDocument {
        content: BookContent::new(BookFormat::Epub, chapters),
        metadata,
    })
}

/// Extract metadata from EPUB without touching chapter content.
pub fn extract_epub_metadata(content: &[u8]) -> Result<BookMetadata> {
    let mut container = EpubContainer::open(content)?;
    Ok(read_metadata(&mut container))
}

fn read_metadata(container: &mut EpubContainer) -> BookMetadata {
    let package = container.metadata.clone();
    BookMetadata {
        title: package.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        author: package.creator.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        publisher: package.publisher,
        description: package.description,
        cover: read_cover(container),
        ..BookMetadata::default()
    }
}

/// The declared cover image as a data URL.
fn read_cover(container: &mut EpubContainer) -> Option<String> {
    let item = container.cover_item()?.clone();
    match container.read_bytes(&item.path) {
        Ok(bytes) => {
            let media_type = if item.media_type.is_empty() {
                mime_guess::from_path(&item.path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            } else {
                item.media_type.clone()
            };
            Some(format!("data:{media_type};base64,{}", BASE64.encode(bytes)))
        }
        Err(err) => {
            warn!(path = %item.path, "Failed to extract cover: {err}");
            None
        }
    }
}

fn extract_chapters(container: &mut EpubContainer, options: &ParseOptions) -> Result<Vec<Chapter>> {
    debug!(spine_items = container.spine.len(), "Loaded spine");
    let toc = container.navigation()?;
    debug!(toc_entries = toc.len(), "Loaded navigation");

    if toc.is_empty() {
        info!("Table of contents is empty, extracting chapters in spine order");
        Ok(chapters_from_spine(container, options.spine_min_chars))
    } else {
        info!("Extracting chapters from the table of contents");
        Ok(chapters_from_toc(container, &toc))
    }
}

/// One chapter per TOC entry whose section has text.
///
/// Ids keep the entry's 1-based TOC position; `order` is the position in the
/// emitted list so skipped entries leave no gaps.
fn chapters_from_toc(container: &mut EpubContainer, toc: &[TocEntry]) -> Vec<Chapter> {
    let mut chapters = Vec::new();

    for (idx, entry) in toc.iter().enumerate() {
        let position = idx + 1;
        let Some(item) = container.spine_item_for(&entry.path).cloned() else {
            warn!(chapter = position, href = %entry.path, "No spine section for TOC entry");
            continue;
        };

        match load_section_text(container, &item) {
            Ok(text) if !text.trim().is_empty() => {
                let title = if entry.label.trim().is_empty() {
                    format!("Chapter {position}")
                } else {
                    entry.label.trim().to_string()
                };
                debug!(chapter = position, title = %title, chars = text.len(), "Extracted TOC chapter");
                chapters.push(Chapter {
                    id: format!("chapter-{position}"),
                    title,
                    content: text,
                    order: chapters.len(),
                });
            }
            Ok(_) => warn!(chapter = position, href = %entry.path, "TOC section has no text"),
            Err(err) => warn!(chapter = position, href = %entry.path, "Failed to load TOC section: {err}"),
        }
    }

    chapters
}

/// One chapter per spine section longer than `min_chars`.
fn chapters_from_spine(container: &mut EpubContainer, min_chars: usize) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let items = container.spine.clone();

    for (idx, item) in items.iter().enumerate() {
        match load_section_text(container, item) {
            Ok(text) => {
                let chars = char_count(text.trim());
                if chars > min_chars {
                    let order = chapters.len();
                    chapters.push(Chapter::new(order, format!("Part {}", order + 1), text));
                    debug!(spine_index = idx, chars, "Extracted spine section");
                } else {
                    debug!(spine_index = idx, chars, "Spine section too short, skipping");
                }
            }
            Err(err) => warn!(spine_index = idx, href = %item.path, "Failed to load spine section: {err}"),
        }
    }

    chapters
}

fn load_section_text(container: &mut EpubContainer, item: &SpineItem) -> Result<String> {
    let markup = container.read_string(&item.path)?;
    Ok(extract_section_text(&Section {
        path: &item.path,
        markup: &markup,
    }))
}
