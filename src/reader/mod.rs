//! Reader-side state: the chapter window, session states and typography.

pub mod session;
pub mod style;
pub mod window;

pub use session::{chapter_blocks, Block, ReaderSession};
pub use style::{LetterSpacing, ReaderSettings, ReaderStyle, ThemePreset};
pub use window::{ChapterBounds, ChapterWindow, ScrollMetrics, WindowConfig, WindowEffect};
