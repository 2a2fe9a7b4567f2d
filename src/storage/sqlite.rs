use super::{BookStore, StoreStats};
use crate::error::Result;
use crate::model::{Book, BookFormat, ReadingProgress};
use crate::utils::now_millis;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    format TEXT NOT NULL,
    cover TEXT NOT NULL,
    added_at INTEGER NOT NULL,
    last_opened INTEGER NOT NULL,
    total_pages INTEGER NOT NULL,
    current_page INTEGER NOT NULL,
    progress REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_books_last_opened ON books(last_opened);
CREATE INDEX IF NOT EXISTS idx_books_title ON books(title);

CREATE TABLE IF NOT EXISTS book_content (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reading_progress (
    book_id TEXT PRIMARY KEY,
    current_page INTEGER NOT NULL,
    total_pages INTEGER NOT NULL,
    scroll_position REAL NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const BOOK_COLUMNS: &str =
    "id, title, author, format, cover, added_at, last_opened, total_pages, current_page, progress";

const UPSERT_BOOK: &str = "INSERT OR REPLACE INTO books
    (id, title, author, format, cover, added_at, last_opened, total_pages, current_page, progress)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const UPSERT_CONTENT: &str =
    "INSERT OR REPLACE INTO book_content (id, content, updated_at) VALUES (?1, ?2, ?3)";

/// SQLite-backed store with an explicit open/close lifecycle.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "Opened library database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, err)| err)?;
        debug!("Closed library database");
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn insert_book(conn: &Connection, book: &Book) -> rusqlite::Result<usize> {
    conn.execute(
        UPSERT_BOOK,
        params![
            book.id,
            book.title,
            book.author,
            book.format.as_str(),
            book.cover,
            book.added_at,
            book.last_opened,
            book.total_pages,
            book.current_page,
            book.progress,
        ],
    )
}

fn insert_content(conn: &Connection, id: &str, content_json: &str) -> rusqlite::Result<usize> {
    conn.execute(UPSERT_CONTENT, params![id, content_json, now_millis()])
}

fn row_to_book(row: &Row) -> rusqlite::Result<Book> {
    let format: String = row.get(3)?;
    let format = BookFormat::from_extension(&format).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("unknown format {format}").into())
    })?;
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        format,
        cover: row.get(4)?,
        added_at: row.get(5)?,
        last_opened: row.get(6)?,
        total_pages: row.get(7)?,
        current_page: row.get(8)?,
        progress: row.get(9)?,
    })
}

fn count(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n as usize)
}

impl BookStore for SqliteStore {
    fn save_book(&self, book: &Book) -> Result<()> {
        insert_book(&self.conn(), book)?;
        debug!(book_id = %book.id, "Saved book");
        Ok(())
    }

    fn get_book(&self, id: &str) -> Result<Option<Book>> {
        let conn = self.conn();
        let book = conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                params![id],
                row_to_book,
            )
            .optional()?;
        Ok(book)
    }

    fn get_all_books(&self) -> Result<Vec<Book>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY added_at"))?;
        let books = stmt
            .query_map([], row_to_book)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(books)
    }

    fn get_recent_books(&self, limit: usize) -> Result<Vec<Book>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY last_opened DESC LIMIT ?1"
        ))?;
        let books = stmt
            .query_map(params![limit as i64], row_to_book)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(books)
    }

    fn delete_book(&self, id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM books WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM book_content WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM reading_progress WHERE book_id = ?1", params![id])?;
        tx.commit()?;
        info!(book_id = id, "Deleted book");
        Ok(())
    }

    fn update_book_last_opened(&self, id: &str) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE books SET last_opened = ?1 WHERE id = ?2",
            params![now_millis(), id],
        )?;
        debug!(book_id = id, updated, "Touched last opened");
        Ok(())
    }

    fn save_book_content(&self, id: &str, content_json: &str) -> Result<()> {
        insert_content(&self.conn(), id, content_json)?;
        debug!(book_id = id, bytes = content_json.len(), "Saved book content");
        Ok(())
    }

    fn get_book_content(&self, id: &str) -> Result<Option<String>> {
        let content = self
            .conn()
            .query_row(
                "SELECT content FROM book_content WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    fn save_imported(&self, book: &Book, content_json: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        insert_book(&tx, book)?;
        insert_content(&tx, &book.id, content_json)?;
        tx.commit()?;
        debug!(book_id = %book.id, bytes = content_json.len(), "Saved imported book");
        Ok(())
    }

    fn save_reading_progress(&self, progress: &ReadingProgress) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO reading_progress
             (book_id, current_page, total_pages, scroll_position, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                progress.book_id,
                progress.current_page,
                progress.total_pages,
                progress.scroll_position,
                progress.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_reading_progress(&self, book_id: &str) -> Result<Option<ReadingProgress>> {
        let progress = self
            .conn()
            .query_row(
                "SELECT book_id, current_page, total_pages, scroll_position, updated_at
                 FROM reading_progress WHERE book_id = ?1",
                params![book_id],
                |row| {
                    Ok(ReadingProgress {
                        book_id: row.get(0)?,
                        current_page: row.get(1)?,
                        total_pages: row.get(2)?,
                        scroll_position: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(progress)
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn();
        Ok(StoreStats {
            book_count: count(&conn, "books")?,
            content_count: count(&conn, "book_content")?,
            progress_count: count(&conn, "reading_progress")?,
        })
    }

    fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM books", [])?;
        tx.execute("DELETE FROM book_content", [])?;
        tx.execute("DELETE FROM reading_progress", [])?;
        tx.commit()?;
        info!("Cleared library database");
        Ok(())
    }
}
