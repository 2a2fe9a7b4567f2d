use super::window::{ChapterWindow, WindowConfig};
use crate::model::{Book, BookContent, Chapter};
use tracing::warn;

/// An opened book as the reader view sees it.
#[derive(Debug, Clone)]
pub enum ReaderSession {
    Ready {
        book: Book,
        content: BookContent,
        window: ChapterWindow,
    },
    /// Stored content is absent or could not be decoded.
    MissingContent { book: Book },
    /// Content decoded but holds no chapters.
    NoChapters { book: Book },
}

/// A display line of a chapter body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    Paragraph(&'a str),
    Spacer,
}

impl ReaderSession {
    pub fn open(book: Book, content: Option<BookContent>, config: WindowConfig) -> Self {
        match content {
            None => {
                warn!(book_id = %book.id, "Opening book without content");
                ReaderSession::MissingContent { book }
            }
            Some(content) if content.chapters.is_empty() => {
                warn!(book_id = %book.id, "Opening book with no chapters");
                ReaderSession::NoChapters { book }
            }
            Some(content) => {
                let mut window = ChapterWindow::new(config);
                window.load_content(content.chapters.len());
                ReaderSession::Ready { book, content, window }
            }
        }
    }

    pub fn book(&self) -> &Book {
        match self {
            ReaderSession::Ready { book, .. }
            | ReaderSession::MissingContent { book }
            | ReaderSession::NoChapters { book } => book,
        }
    }

    /// Explanation for the error view, `None` when the book can be read.
    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            ReaderSession::Ready { .. } => None,
            ReaderSession::MissingContent { .. } => Some("Book content is empty"),
            ReaderSession::NoChapters { .. } => Some("Book has no chapters"),
        }
    }

    pub fn window(&self) -> Option<&ChapterWindow> {
        match self {
            ReaderSession::Ready { window, .. } => Some(window),
            _ => None,
        }
    }

    pub fn window_mut(&mut self) -> Option<&mut ChapterWindow> {
        match self {
            ReaderSession::Ready { window, .. } => Some(window),
            _ => None,
        }
    }

    /// Chapters currently inside the window.
    pub fn rendered_chapters(&self) -> &[Chapter] {
        match self {
            ReaderSession::Ready { content, window, .. } => &content.chapters[..window.loaded_count()],
            _ => &[],
        }
    }
}

/// Split a chapter body into trimmed paragraphs, one per line, with blank
/// lines kept as spacers.
pub fn chapter_blocks(chapter: &Chapter) -> Vec<Block<'_>> {
    chapter
        .content
        .split('\n')
        .map(|line| match line.trim() {
            "" => Block::Spacer,
            text => Block::Paragraph(text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookFormat;
    use std::time::Instant;

    fn book() -> Book {
        Book {
            id: "book-1-abcdefg".to_string(),
            title: "T".to_string(),
            author: "A".to_string(),
            format: BookFormat::Txt,
            cover: String::new(),
            added_at: 0,
            last_opened: 0,
            total_pages: 1,
            current_page: 1,
            progress: 0.0,
        }
    }

    fn content(chapters: usize) -> BookContent {
        let chapters = (0..chapters)
            .map(|i| Chapter::new(i, format!("Chapter {}", i + 1), "text"))
            .collect();
        BookContent::new(BookFormat::Txt, chapters)
    }

    #[test]
    fn test_missing_content_state() {
        let session = ReaderSession::open(book(), None, WindowConfig::default());
        assert!(matches!(session, ReaderSession::MissingContent { .. }));
        assert_eq!(session.error_message(), Some("Book content is empty"));
        assert!(session.rendered_chapters().is_empty());
    }

    #[test]
    fn test_no_chapters_state() {
        let session = ReaderSession::open(book(), Some(content(0)), WindowConfig::default());
        assert!(matches!(session, ReaderSession::NoChapters { .. }));
        assert!(session.window().is_none());
    }

    #[test]
    fn test_ready_renders_window() {
        let mut session = ReaderSession::open(book(), Some(content(10)), WindowConfig::default());
        assert_eq!(session.error_message(), None);
        assert_eq!(session.rendered_chapters().len(), 3);

        session.window_mut().unwrap().jump_to(6, Instant::now());

        assert_eq!(session.rendered_chapters().len(), 7);
        assert_eq!(session.book().title, "T");
    }

    #[test]
    fn test_chapter_blocks() {
        let chapter = Chapter::new(0, "t", "  first \n\n second");
        assert_eq!(
            chapter_blocks(&chapter),
            vec![Block::Paragraph("first"), Block::Spacer, Block::Paragraph("second")]
        );
    }
}
