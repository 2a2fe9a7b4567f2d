use crate::error::Result;
use crate::model::{BookContent, BookFormat, BookMetadata};
use crate::utils;
use serde::{Deserialize, Serialize};

pub mod epub;
pub mod pdf;
pub mod text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Inputs larger than this are rejected before parsing.
    pub max_file_size: usize,
    /// Pages grouped into one synthesized PDF chapter.
    pub pdf_pages_per_chapter: usize,
    /// Spine sections at or below this many characters are skipped when an
    /// EPUB has no table of contents.
    pub spine_min_chars: usize,
    pub normalize_unicode: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,
            pdf_pages_per_chapter: pdf::PAGES_PER_CHAPTER,
            spine_min_chars: epub::SPINE_MIN_CHARS,
            normalize_unicode: false,
        }
    }
}

/// Content plus the metadata gathered while parsing it.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub content: BookContent,
    pub metadata: BookMetadata,
}

/// Main document parsing function
pub fn parse_document(
    content: &[u8],
    filename: &str,
    options: Option<&ParseOptions>,
) -> Result<ParsedDocument> {
    let default_opts = ParseOptions::default();
    let opts = options.unwrap_or(&default_opts);

    let format = utils::detect_format(filename)?;
    utils::validate_file_size(content, opts.max_file_size)?;

    match format {
        BookFormat::Txt => text::parse_txt(content, filename, opts),
        BookFormat::Epub => epub::parse_epub(content, opts),
        BookFormat::Pdf => pdf::parse_pdf(content, filename, opts),
    }
}

/// Extract metadata from document
pub fn extract_metadata(content: &[u8], filename: &str) -> Result<BookMetadata> {
    let format = utils::detect_format(filename)?;

    match format {
        BookFormat::Txt => {
            let decoded = text::decode_text(content)?;
            Ok(text::extract_txt_metadata(filename, &decoded))
        }
        BookFormat::Epub => epub::extract_epub_metadata(content),
        BookFormat::Pdf => pdf::extract_pdf_metadata(content, filename),
    }
}

/// Get list of supported file formats
pub fn get_supported_formats() -> Vec<String> {
    [BookFormat::Txt, BookFormat::Epub, BookFormat::Pdf]
        .iter()
        .map(|format| format.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReaderError;

    #[test]
    fn test_supported_formats() {
        assert_eq!(get_supported_formats(), vec!["txt", "epub", "pdf"]);
    }

    #[test]
    fn test_parse_document_rejects_unknown_extension() {
        let result = parse_document(b"hello", "book.mobi", None);
        assert!(matches!(result, Err(ReaderError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_parse_document_dispatches_txt() {
        let parsed = parse_document("Chapter 1 Start\nbody".as_bytes(), "story.TXT", None).unwrap();
        assert_eq!(parsed.content.format, BookFormat::Txt);
        assert_eq!(parsed.metadata.title, "story");
        assert_eq!(parsed.content.chapters[0].title, "Chapter 1 Start");
    }

    #[test]
    fn test_parse_document_enforces_size_limit() {
        let opts = ParseOptions {
            max_file_size: 4,
            ..ParseOptions::default()
        };
        let result = parse_document(b"too long", "a.txt", Some(&opts));
        assert!(matches!(result, Err(ReaderError::DocumentTooLarge { .. })));
    }

    #[test]
    fn test_mislabeled_file_fails_in_claimed_parser() {
        let result = parse_document(b"plain words", "fake.epub", None);
        assert!(matches!(result, Err(ReaderError::ArchiveError(_))));
    }

    #[test]
    fn test_extract_metadata_for_txt() {
        let meta = extract_metadata("Author: Jane Roe\nText".as_bytes(), "notes.txt").unwrap();
        assert_eq!(meta.title, "notes");
        assert_eq!(meta.author, "Jane Roe");
    }
}
