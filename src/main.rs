//! Command-line front end for the e-book library.
//!
//! Loads configuration, opens the library database and runs one command.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ebook_reader::config::{load_config, LibraryConfig};
use ebook_reader::library::DEFAULT_RECENT_LIMIT;
use ebook_reader::reader::{
    chapter_blocks, Block, ChapterBounds, ReaderSession, ReaderStyle, WindowEffect,
};
use ebook_reader::{get_supported_formats, Book, Library, SqliteStore};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

#[derive(Parser, Debug)]
#[command(name = "ebook-reader")]
#[command(about = "Import, catalog and read TXT, EPUB and PDF books")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Path to the SQLite library database (overrides the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import one or more book files
    Import { files: Vec<PathBuf> },
    /// List every book in the library
    List,
    /// List the most recently opened books
    Recent {
        #[arg(short, long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Mark a book as opened and show its details
    Open { id: String },
    /// Print the chapters a reader session renders
    Read {
        id: String,
        /// Chapter to jump to (1-based)
        #[arg(short, long)]
        chapter: Option<usize>,
    },
    /// Delete a book with its content and progress
    Delete { id: String },
    /// Record reading progress for a book
    Progress {
        id: String,
        #[arg(long)]
        page: u32,
        #[arg(long)]
        total: u32,
        /// Percentage read, 0 to 100
        #[arg(long)]
        percent: f64,
    },
    /// Show record counts
    Stats,
    /// List supported file extensions
    Formats,
}

#[tokio::main]
async fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle).await {
        error!("{err:?}");
        std::process::exit(1);
    }
}

async fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config);
    if let Some(database) = &cli.database {
        config.database_path = database.display().to_string();
    }
    if std::env::var_os("RUST_LOG").is_none() {
        set_log_level(reload_handle, config.log_level.as_filter_str());
    }
    debug!(?config, "Active configuration");

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening library database {}", config.database_path))?;
    let library = Library::with_options(store, config.parse.clone());

    let result = execute(&library, &config, cli.command).await;
    match library.into_store() {
        Some(store) => store.close().context("closing library database")?,
        None => warn!("Library database still in use, leaving it to close on exit"),
    }
    result
}

async fn execute(library: &Library<SqliteStore>, config: &LibraryConfig, command: Command) -> Result<()> {
    match command {
        Command::Import { files } => {
            if files.is_empty() {
                bail!("no files given");
            }
            let mut failures = 0;
            for path in files {
                match library.import_book(&path).await {
                    Ok(book) => println!("Imported {} ({})", book.title, book.id),
                    Err(err) => {
                        failures += 1;
                        warn!(path = %path.display(), "Import failed: {err}");
                        println!("Failed to import {}: {err}", path.display());
                    }
                }
            }
            if failures > 0 {
                bail!("{failures} import(s) failed");
            }
        }
        Command::List => print_books(&library.get_all_books()?),
        Command::Recent { limit } => print_books(&library.get_recent_books(limit)?),
        Command::Open { id } => {
            let book = library.open_book(&id)?;
            print_books(std::slice::from_ref(&book));
            if let Some(progress) = library.get_reading_progress(&id)? {
                println!(
                    "Last position: page {} of {}",
                    progress.current_page, progress.total_pages
                );
            }
        }
        Command::Read { id, chapter } => read_book(library, config, &id, chapter)?,
        Command::Delete { id } => {
            library.delete_book(&id)?;
            println!("Deleted {id}");
        }
        Command::Progress {
            id,
            page,
            total,
            percent,
        } => {
            library.update_progress(&id, page, total, percent.clamp(0.0, 100.0))?;
            println!("Progress saved for {id}");
        }
        Command::Stats => {
            let stats = library.stats()?;
            println!(
                "books: {}, contents: {}, progress records: {}",
                stats.book_count, stats.content_count, stats.progress_count
            );
        }
        Command::Formats => println!("{}", get_supported_formats().join(", ")),
    }
    Ok(())
}

fn read_book(
    library: &Library<SqliteStore>,
    config: &LibraryConfig,
    id: &str,
    chapter: Option<usize>,
) -> Result<()> {
    let book = library.open_book(id)?;
    let content = library.get_book_content(id)?;
    let mut session = ReaderSession::open(book, content, config.reader.clone());

    if let Some(message) = session.error_message() {
        println!("Cannot load \"{}\": {message}", session.book().title);
        println!("Try importing the book again.");
        return Ok(());
    }

    let style = ReaderStyle::from_settings(&config.appearance.effective_settings());
    for (name, value) in style.css_variables() {
        debug!(name, value, "Reader style");
    }

    let mut start = 0;
    if let Some(window) = session.window_mut() {
        if let Some(requested) = chapter {
            let Some(target) = requested.checked_sub(1) else {
                bail!("chapters are numbered from 1");
            };
            let now = Instant::now();
            window.jump_to(target, now);
            for index in 0..window.loaded_count() {
                window.register_chapter_view(index);
            }
            let settled = window.next_deadline().unwrap_or(now);
            for effect in window.poll(settled) {
                if let WindowEffect::ScrollToChapter(index) = effect {
                    start = index;
                    window.on_intersections(
                        &[ChapterBounds {
                            index,
                            top: 0.0,
                            bottom: 1.0,
                        }],
                        1.0,
                    );
                }
            }
            window.teardown();
        }
    }

    for chapter in session.rendered_chapters().iter().skip(start) {
        println!("\n## {}\n", chapter.title);
        for block in chapter_blocks(chapter) {
            match block {
                Block::Paragraph(text) => println!("{text}"),
                Block::Spacer => println!(),
            }
        }
    }

    if let Some(window) = session.window() {
        println!("\n[{}]", window.indicator_label());
        match window.loaded_hint() {
            Some(hint) => println!("[{hint}]"),
            None => println!("[End of book, {} chapters]", window.total_chapters()),
        }
        let total = window.total_chapters() as u32;
        let current = window.visible_chapter() as u32 + 1;
        library.save_reading_progress(id, current, total, window.progress_fraction())?;
        info!(book_id = id, chapter = current, "Saved reading position");
    }
    Ok(())
}

fn print_books(books: &[Book]) {
    if books.is_empty() {
        println!("No books.");
        return;
    }
    for book in books {
        println!(
            "{}  {} by {}  [{}]  page {}/{}  {:.0}%",
            book.id, book.title, book.author, book.format, book.current_page, book.total_pages, book.progress
        );
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        debug!(%level, "Applied log level from config");
    }
}
