//! Catalog and content records shared by the parsers, the store and the reader.
//!
//! Field names serialize in camelCase so stored content stays readable by
//! other tools that already consume the library database.

use crate::text_processor::char_count;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Title of the single chapter emitted when a text file has no headings.
pub const BODY_CHAPTER_TITLE: &str = "Body";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Txt,
    Epub,
    Pdf,
}

impl BookFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Txt => "txt",
            BookFormat::Epub => "epub",
            BookFormat::Pdf => "pdf",
        }
    }

    /// Case-insensitive lookup by file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(BookFormat::Txt),
            "epub" => Some(BookFormat::Epub),
            "pdf" => Some(BookFormat::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub format: BookFormat,
    /// Inline data URL or an external reference.
    pub cover: String,
    /// Epoch milliseconds.
    pub added_at: i64,
    /// Epoch milliseconds.
    pub last_opened: i64,
    pub total_pages: u32,
    pub current_page: u32,
    /// 0 to 100.
    pub progress: f64,
}

/// One unit of the normalized document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Unique within its `BookContent` only.
    pub id: String,
    pub title: String,
    pub content: String,
    /// Zero-based, equal to the chapter's position in the sequence.
    pub order: usize,
}

impl Chapter {
    pub fn new(order: usize, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: format!("chapter-{}", order + 1),
            title: title.into(),
            content: content.into(),
            order,
        }
    }
}

/// The normalized document body produced by every parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookContent {
    pub format: BookFormat,
    pub chapters: Vec<Chapter>,
    /// Original text for the text format, empty otherwise.
    #[serde(default)]
    pub raw_content: String,
}

impl BookContent {
    pub fn new(format: BookFormat, chapters: Vec<Chapter>) -> Self {
        Self {
            format,
            chapters,
            raw_content: String::new(),
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when every chapter's `order` matches its index.
    pub fn has_contiguous_order(&self) -> bool {
        self.chapters
            .iter()
            .enumerate()
            .all(|(idx, chapter)| chapter.order == idx)
    }

    pub fn char_count(&self) -> usize {
        self.chapters
            .iter()
            .map(|chapter| char_count(&chapter.content))
            .sum()
    }
}

/// Descriptive fields gathered by a parser alongside the content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// Declared cover as a data URL, when the format carries one.
    pub cover: Option<String>,
    /// Page count reported by paginated formats.
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub book_id: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub scroll_position: f64,
    pub updated_at: i64,
}
