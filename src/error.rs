use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Unsupported file format: {format}")]
    UnsupportedFormat { format: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing error: {0}")]
    PdfError(String),

    #[error("EPUB parsing error: {0}")]
    EpubError(String),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Document too large: {size} bytes (max: {max_size} bytes)")]
    DocumentTooLarge { size: usize, max_size: usize },

    #[error("Book not found: {id}")]
    BookNotFound { id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReaderError {
    pub fn pdf_error<S: Into<String>>(msg: S) -> Self {
        Self::PdfError(msg.into())
    }

    pub fn epub_error<S: Into<String>>(msg: S) -> Self {
        Self::EpubError(msg.into())
    }
}

impl From<zip::result::ZipError> for ReaderError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::ArchiveError(e.to_string())
    }
}

impl From<roxmltree::Error> for ReaderError {
    fn from(e: roxmltree::Error) -> Self {
        Self::XmlError(e.to_string())
    }
}

impl From<lopdf::Error> for ReaderError {
    fn from(e: lopdf::Error) -> Self {
        Self::PdfError(e.to_string())
    }
}
