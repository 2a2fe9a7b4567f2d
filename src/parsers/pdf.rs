use crate::error::{ReaderError, Result};
use crate::model::{BookContent, BookFormat, BookMetadata, Chapter, UNKNOWN_AUTHOR};
use crate::parsers::{ParseOptions, ParsedDocument};
use crate::text_processor::collapse_whitespace;
use crate::utils::title_from_filename;
use encoding_rs::{UTF_16BE, WINDOWS_1252};
use lopdf::{Dictionary, Document, Object};
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

/// Default number of consecutive pages grouped into one chapter.
pub const PAGES_PER_CHAPTER: usize = 20;

/// Parse PDF document using lopdf
pub fn parse_pdf(content: &[u8], filename: &str, options: &ParseOptions) -> Result<ParsedDocument> {
    info!(bytes = content.len(), "Parsing PDF");
    let doc = load_document(content)?;

    let metadata = read_metadata(&doc, filename);
    let page_count = metadata.page_count.unwrap_or_default() as usize;
    debug!(title = %metadata.title, pages = page_count, "Read PDF metadata");

    let chapters = build_chapters(page_count, options.pdf_pages_per_chapter, |page| {
        extract_page_text(&doc, page)
    });

    info!(chapters = chapters.len(), "Finished parsing PDF");
    Ok(ParsedDocument {
        content: BookContent::new(BookFormat::Pdf, chapters),
        metadata,
    })
}

/// Extract metadata from PDF
pub fn extract_pdf_metadata(content: &[u8], filename: &str) -> Result<BookMetadata> {
    let doc = load_document(content)?;
    Ok(read_metadata(&doc, filename))
}

/// Text of one page (1-based), fragments joined with single spaces.
///
/// Line and paragraph breaks inside the page are not preserved.
pub fn extract_page_text(doc: &Document, page: u32) -> Result<String> {
    let text = doc.extract_text(&[page])?;
    Ok(collapse_whitespace(&text))
}

fn load_document(content: &[u8]) -> Result<Document> {
    Document::load_mem(content).map_err(|e| ReaderError::pdf_error(format!("Failed to load PDF: {e}")))
}

/// Inclusive 1-based page ranges of `band_size` pages each; the last one may
/// be shorter.
pub fn band_pages(page_count: usize, band_size: usize) -> Vec<RangeInclusive<u32>> {
    let band_size = band_size.max(1);
    (0..page_count.div_ceil(band_size))
        .map(|band| {
            let start = band * band_size + 1;
            let end = ((band + 1) * band_size).min(page_count);
            start as u32..=end as u32
        })
        .collect()
}

/// One chapter per band. A page whose text cannot be read is left out of its
/// band.
pub fn build_chapters<F>(page_count: usize, band_size: usize, mut page_text: F) -> Vec<Chapter>
where
    F: FnMut(u32) -> Result<String>,
{
    band_pages(page_count, band_size)
        .into_iter()
        .enumerate()
        .map(|(idx, pages)| {
            let (start, end) = (*pages.start(), *pages.end());
            let mut parts = Vec::new();
            for page in pages {
                match page_text(page) {
                    Ok(text) => parts.push(format!("--- Page {page} ---\n\n{text}")),
                    Err(err) => warn!(page, "Failed to extract page: {err}"),
                }
            }
            debug!(chapter = idx + 1, start, end, pages_read = parts.len(), "Built page band");
            Chapter::new(
                idx,
                format!("Part {} (pages {start}-{end})", idx + 1),
                parts.join("\n\n").trim().to_string(),
            )
        })
        .collect()
}

fn read_metadata(doc: &Document, filename: &str) -> BookMetadata {
    let info = info_dictionary(doc);

    BookMetadata {
        title: info_name(info, b"Title").unwrap_or_else(|| title_from_filename(filename)),
        author: info_name(info, b"Author").unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        subject: info_string(info, b"Subject"),
        keywords: info_string(info, b"Keywords"),
        page_count: Some(doc.get_pages().len() as u32),
        ..BookMetadata::default()
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// A string entry exactly as stored.
fn info_string(info: Option<&Dictionary>, key: &[u8]) -> Option<String> {
    match info?.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

/// A trimmed string entry; blank values count as absent.
fn info_name(info: Option<&Dictionary>, key: &[u8]) -> Option<String> {
    info_string(info, key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Info strings are UTF-16BE when they start with a byte order mark, and
/// PDFDocEncoding (close enough to Windows-1252) otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    let decoded = if bytes.starts_with(&[0xFE, 0xFF]) {
        UTF_16BE.decode_without_bom_handling(&bytes[2..]).0.into_owned()
    } else if let Ok(text) = std::str::from_utf8(bytes) {
        text.to_string()
    } else {
        WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
    };
    decoded
}
