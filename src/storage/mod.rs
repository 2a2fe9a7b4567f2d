//! Persistent catalog, content and progress records.

use crate::error::Result;
use crate::model::{Book, ReadingProgress};
use serde::Serialize;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Row counts per record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub book_count: usize,
    pub content_count: usize,
    pub progress_count: usize,
}

/// Storage collaborator used by [`crate::library::Library`].
///
/// Saves are upserts keyed by book id. Lookups of unknown ids return `None`
/// rather than an error.
pub trait BookStore {
    fn save_book(&self, book: &Book) -> Result<()>;
    fn get_book(&self, id: &str) -> Result<Option<Book>>;
    fn get_all_books(&self) -> Result<Vec<Book>>;
    /// Most recently opened first.
    fn get_recent_books(&self, limit: usize) -> Result<Vec<Book>>;
    /// Removes the book together with its content and progress records.
    fn delete_book(&self, id: &str) -> Result<()>;
    /// No-op for unknown ids.
    fn update_book_last_opened(&self, id: &str) -> Result<()>;

    fn save_book_content(&self, id: &str, content_json: &str) -> Result<()>;
    fn get_book_content(&self, id: &str) -> Result<Option<String>>;

    /// Writes the catalog entry and its content together; on failure neither
    /// is stored.
    fn save_imported(&self, book: &Book, content_json: &str) -> Result<()>;

    fn save_reading_progress(&self, progress: &ReadingProgress) -> Result<()>;
    fn get_reading_progress(&self, book_id: &str) -> Result<Option<ReadingProgress>>;

    fn stats(&self) -> Result<StoreStats>;
    fn clear_all(&self) -> Result<()>;
}
