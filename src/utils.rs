use crate::error::{ReaderError, Result};
use crate::model::BookFormat;
use std::path::Path;

/// Detect the book format from the filename extension alone.
///
/// Content is never sniffed: a mislabeled file is handed to whichever parser
/// its extension names.
pub fn detect_format(filename: &str) -> Result<BookFormat> {
    get_file_extension(filename)
        .as_deref()
        .and_then(BookFormat::from_extension)
        .ok_or_else(|| ReaderError::UnsupportedFormat {
            format: filename.to_string(),
        })
}

/// Validate file size
pub fn validate_file_size(content: &[u8], max_size: usize) -> Result<()> {
    if content.len() > max_size {
        return Err(ReaderError::DocumentTooLarge {
            size: content.len(),
            max_size,
        });
    }
    Ok(())
}

/// Extract file extension from filename
pub fn get_file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Filename with its directory and final extension removed.
pub fn title_from_filename(filename: &str) -> String {
    let path = Path::new(filename);
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| filename.to_string())
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Name portion of a path, used when a caller hands over a full path.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
