//! Import orchestration and the catalog operations the UI calls.

use crate::cover::generate_cover;
use crate::error::{ReaderError, Result};
use crate::model::{Book, BookContent, BookFormat, ReadingProgress};
use crate::parsers::{parse_document, ParseOptions, ParsedDocument};
use crate::storage::{BookStore, StoreStats};
use crate::text_processor::char_count;
use crate::utils::{detect_format, file_name, now_millis};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_RECENT_LIMIT: usize = 10;
/// Characters per page used to estimate text book length.
pub const CHARS_PER_PAGE: usize = 1500;
/// Page estimate for formats without a character-density heuristic.
pub const PLACEHOLDER_PAGE_COUNT: u32 = 100;

pub struct Library<S: BookStore> {
    store: Arc<S>,
    options: ParseOptions,
}

impl<S: BookStore> Library<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, ParseOptions::default())
    }

    pub fn with_options(store: S, options: ParseOptions) -> Self {
        Self {
            store: Arc::new(store),
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hand the store back for closing. `None` while an import task still
    /// holds it.
    pub fn into_store(self) -> Option<S> {
        Arc::into_inner(self.store)
    }

    /// Read, parse and persist the file at `path`.
    ///
    /// The extension is checked before the file is read. Parsing and the
    /// store write both run on the blocking pool; the catalog entry and
    /// content are written in one store call so a failure leaves nothing
    /// behind.
    pub async fn import_book(&self, path: impl AsRef<Path>) -> Result<Book>
    where
        S: Send + Sync + 'static,
    {
        let path = path.as_ref();
        let filename = file_name(path);
        let format = detect_format(&filename)?;
        info!(path = %path.display(), %format, "Importing book");

        let data = tokio::fs::read(path).await?;
        let options = self.options.clone();
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let parsed = parse_document(&data, &filename, Some(&options))?;
            store_parsed(store.as_ref(), &filename, parsed)
        })
        .await
        .map_err(io::Error::from)?
    }

    /// Parse and persist in-memory file contents on the calling thread.
    pub fn import_bytes(&self, data: &[u8], filename: &str) -> Result<Book> {
        let parsed = parse_document(data, filename, Some(&self.options))?;
        store_parsed(self.store.as_ref(), filename, parsed)
    }

    pub fn get_book(&self, id: &str) -> Result<Option<Book>> {
        self.store.get_book(id)
    }

    /// Stored content, or `None` when it is missing or cannot be decoded.
    pub fn get_book_content(&self, id: &str) -> Result<Option<BookContent>> {
        let Some(json) = self.store.get_book_content(id)? else {
            debug!(book_id = id, "No stored content");
            return Ok(None);
        };
        match BookContent::from_json(&json) {
            Ok(content) => Ok(Some(content)),
            Err(err) => {
                error!(book_id = id, "Failed to decode stored content: {err}");
                Ok(None)
            }
        }
    }

    pub fn get_all_books(&self) -> Result<Vec<Book>> {
        self.store.get_all_books()
    }

    pub fn get_recent_books(&self, limit: usize) -> Result<Vec<Book>> {
        self.store.get_recent_books(limit)
    }

    pub fn delete_book(&self, id: &str) -> Result<()> {
        self.store.delete_book(id)
    }

    /// Touch the last-opened timestamp and return the refreshed entry.
    pub fn open_book(&self, id: &str) -> Result<Book> {
        self.store.update_book_last_opened(id)?;
        self.store
            .get_book(id)?
            .ok_or_else(|| ReaderError::BookNotFound { id: id.to_string() })
    }

    /// Unknown ids are ignored.
    pub fn update_progress(&self, id: &str, current_page: u32, total_pages: u32, progress: f64) -> Result<()> {
        match self.store.get_book(id)? {
            Some(mut book) => {
                book.current_page = current_page;
                book.total_pages = total_pages;
                book.progress = progress;
                self.store.save_book(&book)?;
                debug!(book_id = id, current_page, total_pages, progress, "Updated progress");
            }
            None => warn!(book_id = id, "Progress update for unknown book"),
        }
        Ok(())
    }

    pub fn save_reading_progress(
        &self,
        book_id: &str,
        current_page: u32,
        total_pages: u32,
        scroll_position: f64,
    ) -> Result<()> {
        self.store.save_reading_progress(&ReadingProgress {
            book_id: book_id.to_string(),
            current_page,
            total_pages,
            scroll_position,
            updated_at: now_millis(),
        })
    }

    pub fn get_reading_progress(&self, book_id: &str) -> Result<Option<ReadingProgress>> {
        self.store.get_reading_progress(book_id)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    pub fn clear_all(&self) -> Result<()> {
        self.store.clear_all()
    }
}

fn store_parsed<S: BookStore>(store: &S, filename: &str, parsed: ParsedDocument) -> Result<Book> {
    let book = build_book(&parsed);
    let json = parsed.content.to_json()?;
    store.save_imported(&book, &json)?;
    info!(
        book_id = %book.id,
        file = filename,
        title = %book.title,
        chapters = parsed.content.chapters.len(),
        "Imported book"
    );
    Ok(book)
}

/// Catalog entry for a freshly parsed document.
pub fn build_book(parsed: &ParsedDocument) -> Book {
    let now = now_millis();
    let metadata = &parsed.metadata;
    let format = parsed.content.format;
    let total_pages = match format {
        BookFormat::Txt => estimate_pages(&parsed.content.raw_content),
        BookFormat::Epub | BookFormat::Pdf => PLACEHOLDER_PAGE_COUNT,
    };

    Book {
        id: generate_book_id(),
        title: metadata.title.clone(),
        author: metadata.author.clone(),
        format,
        cover: metadata
            .cover
            .clone()
            .unwrap_or_else(|| generate_cover(&metadata.title)),
        added_at: now,
        last_opened: now,
        total_pages,
        current_page: 1,
        progress: 0.0,
    }
}

/// `book-<millis>-<7 random hex chars>`.
pub fn generate_book_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("book-{}-{}", now_millis(), &suffix[..7])
}

pub fn estimate_pages(text: &str) -> u32 {
    char_count(text).div_ceil(CHARS_PER_PAGE) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookMetadata;
    use crate::storage::SqliteStore;
    use std::fs;

    fn library() -> Library<SqliteStore> {
        Library::new(SqliteStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_estimate_pages() {
        assert_eq!(estimate_pages(""), 0);
        assert_eq!(estimate_pages(&"a".repeat(1500)), 1);
        assert_eq!(estimate_pages(&"字".repeat(1501)), 2);
    }

    #[test]
    fn test_book_id_shape() {
        let id = generate_book_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "book");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 7);
        assert_ne!(generate_book_id(), id);
    }

    #[test]
    fn test_build_book_prefers_declared_cover() {
        let parsed = ParsedDocument {
            content: BookContent::new(BookFormat::Epub, Vec::new()),
            metadata: BookMetadata {
                title: "Declared".to_string(),
                author: "A".to_string(),
                cover: Some("data:image/png;base64,AA==".to_string()),
                ..BookMetadata::default()
            },
        };
        let book = build_book(&parsed);
        assert_eq!(book.cover, "data:image/png;base64,AA==");
        assert_eq!(book.total_pages, PLACEHOLDER_PAGE_COUNT);
        assert_eq!(book.current_page, 1);
        assert_eq!(book.progress, 0.0);
        assert_eq!(book.added_at, book.last_opened);
    }

    #[tokio::test]
    async fn test_import_txt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Journey.TXT");
        fs::write(&path, "作者：李明\n第一章 开端\nhello\n第二章 终章\nworld").unwrap();
        let library = library();

        let book = library.import_book(&path).await.unwrap();

        assert_eq!(book.title, "Journey");
        assert_eq!(book.author, "李明");
        assert_eq!(book.format, BookFormat::Txt);
        assert!(book.cover.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(book.total_pages, 1);
        assert_eq!(library.get_book(&book.id).unwrap(), Some(book.clone()));

        let content = library.get_book_content(&book.id).unwrap().unwrap();
        assert_eq!(content.chapters.len(), 2);
        assert_eq!(content.chapters[1].title, "第二章 终章");
    }

    #[tokio::test]
    async fn test_import_writes_from_blocking_pool_and_releases_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Short.txt");
        fs::write(&path, "Chapter 1\nbody").unwrap();
        let library = library();

        let book = library.import_book(&path).await.unwrap();

        assert_eq!(library.stats().unwrap().book_count, 1);
        let store = library.into_store().expect("no import task holds the store");
        assert!(store.get_book(&book.id).unwrap().is_some());
        store.close().unwrap();
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        fs::write(&path, "text").unwrap();
        let library = library();

        let result = library.import_book(&path).await;

        assert!(matches!(result, Err(ReaderError::UnsupportedFormat { .. })));
        assert_eq!(library.stats().unwrap(), StoreStats::default());
    }

    #[tokio::test]
    async fn test_import_corrupt_pdf_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, "not a pdf at all").unwrap();
        let library = library();

        assert!(library.import_book(&path).await.is_err());
        assert_eq!(library.stats().unwrap(), StoreStats::default());
    }

    #[tokio::test]
    async fn test_import_missing_file_is_io_error() {
        let library = library();
        let result = library.import_book("/definitely/not/here.txt").await;
        assert!(matches!(result, Err(ReaderError::Io(_))));
    }

    #[test]
    fn test_reimport_creates_new_book() {
        let library = library();
        let first = library.import_bytes(b"plain text", "same.txt").unwrap();
        let second = library.import_bytes(b"plain text", "same.txt").unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(library.get_all_books().unwrap().len(), 2);
    }

    #[test]
    fn test_undecodable_content_is_none() {
        let library = library();
        let book = library.import_bytes(b"text", "a.txt").unwrap();
        library.store().save_book_content(&book.id, "{not json").unwrap();

        assert_eq!(library.get_book_content(&book.id).unwrap(), None);
        assert_eq!(library.get_book_content("missing").unwrap(), None);
    }

    #[test]
    fn test_open_book_touches_last_opened() {
        let library = library();
        let mut book = library.import_bytes(b"text", "a.txt").unwrap();
        book.last_opened = 0;
        library.store().save_book(&book).unwrap();

        let opened = library.open_book(&book.id).unwrap();

        assert!(opened.last_opened > 0);
        assert!(matches!(
            library.open_book("nope"),
            Err(ReaderError::BookNotFound { .. })
        ));
    }

    #[test]
    fn test_update_progress() {
        let library = library();
        let book = library.import_bytes(b"text", "a.txt").unwrap();

        library.update_progress(&book.id, 5, 20, 25.0).unwrap();
        library.update_progress("unknown", 1, 1, 1.0).unwrap();

        let stored = library.get_book(&book.id).unwrap().unwrap();
        assert_eq!((stored.current_page, stored.total_pages), (5, 20));
        assert_eq!(stored.progress, 25.0);
    }

    #[test]
    fn test_delete_removes_progress() {
        let library = library();
        let book = library.import_bytes(b"text", "a.txt").unwrap();
        library.save_reading_progress(&book.id, 3, 9, 0.5).unwrap();
        assert!(library.get_reading_progress(&book.id).unwrap().is_some());

        library.delete_book(&book.id).unwrap();

        assert!(library.get_reading_progress(&book.id).unwrap().is_none());
        assert!(library.get_book_content(&book.id).unwrap().is_none());
        assert_eq!(library.stats().unwrap(), StoreStats::default());
    }
}
