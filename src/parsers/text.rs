use crate::error::{ReaderError, Result};
use crate::model::{BookContent, BookFormat, BookMetadata, Chapter, BODY_CHAPTER_TITLE, UNKNOWN_AUTHOR};
use crate::parsers::{ParseOptions, ParsedDocument};
use crate::text_processor::{self, CleanOptions};
use crate::utils;
use encoding_rs::*;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

/// Lines scanned for an author label.
const AUTHOR_SCAN_LINES: usize = 10;

static RE_AUTHOR_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:作者|author)[：:]\s*(.+)").expect("valid regex"));

static STANDARD_HEADINGS: Lazy<HeadingSet> = Lazy::new(|| {
    HeadingSet::new(vec![
        HeadingPattern::new(
            "chinese-ordinal",
            r"(?mR)^(第[零一二三四五六七八九十百千\d]+章)(.*)$",
        )
        .expect("valid chinese heading regex"),
        HeadingPattern::new("latin-chapter", r"(?mRi)^(chapter[ \t]+\d+)(.*)$")
            .expect("valid latin heading regex"),
    ])
});

/// Parse plain text file
pub fn parse_txt(content: &[u8], filename: &str, options: &ParseOptions) -> Result<ParsedDocument> {
    info!(filename, bytes = content.len(), "Parsing text file");

    let decoded = decode_text(content)?;
    let clean_opts = CleanOptions {
        normalize_unicode: options.normalize_unicode,
        ..CleanOptions::default()
    };
    let text = text_processor::clean_text(&decoded, Some(&clean_opts));

    let metadata = extract_txt_metadata(filename, &text);
    let mut content = build_txt_content(text, HeadingSet::standard());
    content.raw_content = decoded;

    info!(
        filename,
        chapters = content.chapters.len(),
        "Finished parsing text file"
    );
    Ok(ParsedDocument { content, metadata })
}

/// Split `text` into chapters, falling back to a single body chapter.
///
/// The result always holds at least one chapter.
pub fn build_txt_content(text: String, headings: &HeadingSet) -> BookContent {
    let mut chapters = split_into_chapters(&text, headings);

    if chapters.is_empty() {
        debug!("No chapter headings found, using the whole text as one chapter");
        chapters.push(Chapter::new(0, BODY_CHAPTER_TITLE, text.clone()));
    }

    BookContent {
        format: BookFormat::Txt,
        chapters,
        raw_content: text,
    }
}

/// Split text at every recognized heading line.
///
/// A chapter runs from its heading to the next heading (exclusive), or to the
/// end of the text for the last one.
pub fn split_into_chapters(text: &str, headings: &HeadingSet) -> Vec<Chapter> {
    let matches = headings.find_headings(text);

    matches
        .iter()
        .enumerate()
        .map(|(idx, heading)| {
            let end = matches
                .get(idx + 1)
                .map(|next| next.start)
                .unwrap_or(text.len());
            let body = text[heading.start..end].trim();
            Chapter::new(idx, heading.title(), body)
        })
        .collect()
}

/// One heading line found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    /// Byte offset of the heading's first character.
    pub start: usize,
    pub marker: String,
    pub trailing: String,
}

impl HeadingMatch {
    /// Marker plus any same-line text, whitespace-trimmed.
    pub fn title(&self) -> String {
        let marker = self.marker.trim();
        let trailing = self.trailing.trim();
        if trailing.is_empty() {
            marker.to_string()
        } else {
            format!("{marker} {trailing}")
        }
    }
}

/// A single heading convention.
///
/// The regex must be line-anchored and expose two groups: the marker and the
/// rest of the line.
#[derive(Debug, Clone)]
pub struct HeadingPattern {
    name: &'static str,
    regex: Regex,
}

impl HeadingPattern {
    pub fn new(name: &'static str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| ReaderError::InvalidConfig(format!("heading pattern {name}: {e}")))?;
        if regex.captures_len() < 3 {
            return Err(ReaderError::InvalidConfig(format!(
                "heading pattern {name} needs a marker group and a trailing group"
            )));
        }
        Ok(Self { name, regex })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    fn find_all<'t>(&'t self, text: &'t str) -> impl Iterator<Item = HeadingMatch> + 't {
        self.regex.captures_iter(text).filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(HeadingMatch {
                start: whole.start(),
                marker: caps.get(1)?.as_str().to_string(),
                trailing: caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string(),
            })
        })
    }
}

/// Ordered set of heading recognizers.
///
/// When two patterns claim the same line, the earlier pattern wins.
#[derive(Debug, Clone)]
pub struct HeadingSet {
    patterns: Vec<HeadingPattern>,
}

impl HeadingSet {
    pub fn new(patterns: Vec<HeadingPattern>) -> Self {
        Self { patterns }
    }

    /// Chinese ordinal chapters (`第一千二百章`, `第12章`) and Latin `Chapter N`.
    pub fn standard() -> &'static HeadingSet {
        &STANDARD_HEADINGS
    }

    pub fn with_pattern(mut self, pattern: HeadingPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn patterns(&self) -> &[HeadingPattern] {
        &self.patterns
    }

    /// All heading lines in text order.
    pub fn find_headings(&self, text: &str) -> Vec<HeadingMatch> {
        let mut found: Vec<HeadingMatch> = Vec::new();
        for pattern in &self.patterns {
            for heading in pattern.find_all(text) {
                if !found.iter().any(|existing| existing.start == heading.start) {
                    found.push(heading);
                }
            }
        }
        found.sort_by_key(|heading| heading.start);
        found
    }
}

/// Title from the filename, author from an `Author:` / `作者：` label in the
/// first lines.
pub fn extract_txt_metadata(filename: &str, text: &str) -> BookMetadata {
    let author = text
        .split('\n')
        .take(AUTHOR_SCAN_LINES)
        .filter_map(|line| RE_AUTHOR_LABEL.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .find(|author| !author.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    BookMetadata {
        title: utils::title_from_filename(filename),
        author,
        ..BookMetadata::default()
    }
}

/// Decode text with proper encoding detection
pub fn decode_text(content: &[u8]) -> Result<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(content) {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(&content[bom_len..]);
        if had_errors {
            warn!(
                encoding = encoding.name(),
                "Invalid byte sequences replaced while decoding"
            );
        }
        return Ok(decoded.into_owned());
    }

    // Try UTF-8 first
    if let Ok(text) = std::str::from_utf8(content) {
        return Ok(text.to_string());
    }

    // Try common encodings
    for encoding in [GBK, BIG5, WINDOWS_1252] {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(content);
        if !had_errors {
            debug!(encoding = encoding.name(), "Decoded text with fallback encoding");
            return Ok(decoded.into_owned());
        }
    }

    // Fallback to UTF-8 with replacement characters
    Ok(String::from_utf8_lossy(content).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> BookContent {
        build_txt_content(text.to_string(), HeadingSet::standard())
    }

    #[test]
    fn test_chinese_chapters_split() {
        let text = "第一章 开端\nhello\n第二章 终章\nworld";
        let content = parse(text);

        assert_eq!(content.chapters.len(), 2);
        assert_eq!(content.chapters[0].title, "第一章 开端");
        assert_eq!(content.chapters[1].title, "第二章 终章");
        assert_eq!(content.chapters[0].content, "第一章 开端\nhello");
        assert_eq!(content.chapters[1].content, "第二章 终章\nworld");
        assert!(text.ends_with(&content.chapters[1].content));
        assert_eq!(content.raw_content, text);
    }

    #[test]
    fn test_latin_headings_are_case_insensitive() {
        let text = "Preface text\nCHAPTER 1\nalpha\nchapter 2: The Road\nbeta\nChapter 3\ngamma";
        let content = parse(text);

        let titles: Vec<_> = content.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["CHAPTER 1", "chapter 2 : The Road", "Chapter 3"]);
    }

    #[test]
    fn test_text_before_first_heading_is_not_a_chapter() {
        let content = parse("front matter\n第1章 起\nbody");
        assert_eq!(content.chapters.len(), 1);
        assert_eq!(content.chapters[0].content, "第1章 起\nbody");
    }

    #[test]
    fn test_heading_must_start_a_line() {
        let content = parse("see 第一章 for details\nplain");
        assert_eq!(content.chapters.len(), 1);
        assert_eq!(content.chapters[0].title, BODY_CHAPTER_TITLE);
    }

    #[test]
    fn test_no_headings_yields_single_body_chapter() {
        let text = "just some prose\nwithout any headings";
        let content = parse(text);

        assert_eq!(content.chapters.len(), 1);
        assert_eq!(content.chapters[0].title, BODY_CHAPTER_TITLE);
        assert_eq!(content.chapters[0].content, text);
        assert_eq!(content.chapters[0].id, "chapter-1");
    }

    #[test]
    fn test_empty_text_still_has_one_chapter() {
        assert_eq!(parse("").chapters.len(), 1);
        assert_eq!(parse("\n\n  \n").chapters.len(), 1);
    }

    #[test]
    fn test_order_matches_position() {
        let text = (1..=12)
            .map(|n| format!("Chapter {n}\nline {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let content = parse(&text);

        assert_eq!(content.chapters.len(), 12);
        assert!(content.has_contiguous_order());
        assert_eq!(content.chapters[11].id, "chapter-12");
    }

    #[test]
    fn test_crlf_headings() {
        let content = parse("第一千零一章 远行\r\nbody\r\n第二章\r\nend");
        assert_eq!(content.chapters.len(), 2);
        assert_eq!(content.chapters[0].title, "第一千零一章 远行");
        assert_eq!(content.chapters[1].title, "第二章");
    }

    #[test]
    fn test_custom_heading_pattern() {
        let headings = HeadingSet::standard()
            .clone()
            .with_pattern(HeadingPattern::new("part", r"(?m)^(Part [IVX]+)(.*)$").unwrap());
        let content = build_txt_content("Part I Dawn\na\nPart II Dusk\nb".to_string(), &headings);

        assert_eq!(content.chapters.len(), 2);
        assert_eq!(content.chapters[1].title, "Part II Dusk");
    }

    #[test]
    fn test_standard_headings_are_built_once() {
        let first = HeadingSet::standard();
        assert!(std::ptr::eq(first, HeadingSet::standard()));
        let names: Vec<_> = first.patterns().iter().map(HeadingPattern::name).collect();
        assert_eq!(names, vec!["chinese-ordinal", "latin-chapter"]);
    }

    #[test]
    fn test_heading_pattern_requires_groups() {
        assert!(HeadingPattern::new("bad", r"(?m)^Chapter").is_err());
    }

    #[test]
    fn test_extract_metadata_author_labels() {
        let meta = extract_txt_metadata("三体.txt", "书名\n作者：刘慈欣\n正文");
        assert_eq!(meta.title, "三体");
        assert_eq!(meta.author, "刘慈欣");

        let meta = extract_txt_metadata("book.txt", "AUTHOR: Mary Shelley\nAuthor: Someone Else");
        assert_eq!(meta.author, "Mary Shelley");
    }

    #[test]
    fn test_extract_metadata_only_scans_first_lines() {
        let mut text = "line\n".repeat(10);
        text.push_str("Author: Too Late");
        let meta = extract_txt_metadata("late.txt", &text);
        assert_eq!(meta.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_decode_text() {
        let utf8_text = "Hello, 世界!";
        let result = decode_text(utf8_text.as_bytes()).unwrap();
        assert_eq!(result, utf8_text);
    }

    #[test]
    fn test_decode_gbk_text() {
        let (encoded, _, _) = GBK.encode("第一章 开端");
        let result = decode_text(&encoded).unwrap();
        assert_eq!(result, "第一章 开端");
    }

    #[test]
    fn test_bom_with_invalid_bytes_decodes_lossily() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Chapter 1\nok \xff bad");

        assert_eq!(decode_text(&bytes).unwrap(), "Chapter 1\nok \u{fffd} bad");

        let parsed = parse_txt(&bytes, "stray.txt", &ParseOptions::default()).unwrap();
        assert_eq!(parsed.content.chapters.len(), 1);
        assert_eq!(parsed.content.chapters[0].title, "Chapter 1");
    }

    #[test]
    fn test_raw_content_is_decoded_text_before_cleaning() {
        let input = "\u{feff}Intro\u{0007}\nChapter 1\nbody";

        let parsed = parse_txt(input.as_bytes(), "raw.txt", &ParseOptions::default()).unwrap();

        assert_eq!(parsed.content.raw_content, "Intro\u{0007}\nChapter 1\nbody");
        assert_eq!(parsed.content.chapters[0].content, "Chapter 1\nbody");
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Chapter 1".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "Chapter 1");
    }
}
