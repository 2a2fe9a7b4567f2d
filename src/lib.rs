pub mod config;
pub mod cover;
pub mod error;
pub mod library;
pub mod model;
pub mod parsers;
pub mod reader;
pub mod storage;
pub mod text_processor;
pub mod utils;

pub use error::{ReaderError, Result};
pub use library::Library;
pub use model::{Book, BookContent, BookFormat, BookMetadata, Chapter, ReadingProgress};
pub use parsers::{extract_metadata, get_supported_formats, parse_document, ParseOptions, ParsedDocument};
pub use storage::{BookStore, SqliteStore, StoreStats};
