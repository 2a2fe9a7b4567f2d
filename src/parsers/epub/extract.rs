//! Plain-text extraction from a loaded spine section.
//!
//! Several representations of a section are tried in a fixed order and the
//! first one that yields non-empty text wins.

use super::container::parse_xml;
use crate::text_processor::tidy_extracted_text;
use html2text::render::text_renderer::TrivialDecorator;
use quick_xml::events::Event;
use quick_xml::Reader;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Wide enough that the renderer never inserts its own line breaks.
const RENDER_WIDTH: usize = 10_000;

static RE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*?)(?:</body>|\z)").expect("valid regex"));
static RE_SCRIPTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").expect("valid regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// A section's markup as loaded from the archive.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub path: &'a str,
    pub markup: &'a str,
}

pub type Extractor = fn(&Section) -> Option<String>;

#[derive(Clone, Copy)]
pub struct TextStrategy {
    pub name: &'static str,
    pub extract: Extractor,
}

/// Strategies in priority order.
pub const STRATEGIES: [TextStrategy; 4] = [
    TextStrategy {
        name: "rendered-output",
        extract: rendered_output,
    },
    TextStrategy {
        name: "parsed-document",
        extract: parsed_document,
    },
    TextStrategy {
        name: "raw-contents",
        extract: raw_contents,
    },
    TextStrategy {
        name: "body-query",
        extract: body_query,
    },
];

/// Run `strategies` in order; empty string when all of them come back empty.
pub fn extract_with(section: &Section, strategies: &[TextStrategy]) -> String {
    for strategy in strategies {
        match (strategy.extract)(section) {
            Some(text) if !text.trim().is_empty() => {
                debug!(
                    path = section.path,
                    strategy = strategy.name,
                    chars = text.len(),
                    "Extracted section text"
                );
                return text.trim().to_string();
            }
            _ => debug!(path = section.path, strategy = strategy.name, "Strategy yielded no text"),
        }
    }
    warn!(path = section.path, "No extraction strategy produced text");
    String::new()
}

pub fn extract_section_text(section: &Section) -> String {
    extract_with(section, &STRATEGIES)
}

/// Markup rendered to plain text without decorations.
fn rendered_output(section: &Section) -> Option<String> {
    if section.markup.trim().is_empty() {
        return None;
    }
    let rendered = html2text::from_read_with_decorator(
        section.markup.as_bytes(),
        RENDER_WIDTH,
        TrivialDecorator::new(),
    );
    Some(tidy_extracted_text(&rendered))
}

/// Text content of `<body>` (or the root element) from a strict XML parse.
fn parsed_document(section: &Section) -> Option<String> {
    let doc = parse_xml(section.markup).ok()?;
    let root = doc.root_element();
    let body = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "body")
        .unwrap_or(root);

    let text: String = body
        .descendants()
        .filter(|n| n.is_text())
        .filter(|n| {
            !n.ancestors()
                .any(|a| matches!(a.tag_name().name(), "script" | "style"))
        })
        .filter_map(|n| n.text())
        .collect();
    Some(tidy_extracted_text(&text))
}

/// Lenient event scan of the raw markup; tolerates unclosed tags and HTML
/// entities the strict parse rejects.
fn raw_contents(section: &Section) -> Option<String> {
    let mut reader = Reader::from_str(section.markup);
    reader.check_end_names(false);

    let mut all_text = String::new();
    let mut body_text = String::new();
    let mut seen_body = false;
    let mut in_body = false;
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"body" => {
                    seen_body = true;
                    in_body = true;
                }
                b"script" | b"style" | b"head" => skip_depth += 1,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"body" => in_body = false,
                b"script" | b"style" | b"head" => skip_depth = skip_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Text(t)) if skip_depth == 0 => {
                let text = t
                    .unescape_with(resolve_html_entity)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                all_text.push_str(&text);
                if in_body {
                    body_text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) if skip_depth == 0 => {
                let text = String::from_utf8_lossy(&c).into_owned();
                all_text.push_str(&text);
                if in_body {
                    body_text.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(path = section.path, "Raw scan stopped early: {err}");
                break;
            }
        }
    }

    let text = if seen_body { body_text } else { all_text };
    Some(tidy_extracted_text(&text))
}

/// Regex lookup of the body element with tags stripped.
fn body_query(section: &Section) -> Option<String> {
    let inner = RE_BODY.captures(section.markup)?.get(1)?.as_str();
    let without_scripts = RE_SCRIPTS.replace_all(inner, "");
    let stripped = RE_TAGS.replace_all(&without_scripts, "");
    let decoded = quick_xml::escape::unescape_with(&stripped, resolve_html_entity)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| stripped.to_string());
    Some(tidy_extracted_text(&decoded))
}

/// Named entities common in book markup beyond the five XML ones.
fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    Some(match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "copy" => "\u{a9}",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(markup: &str) -> Section<'_> {
        Section {
            path: "OEBPS/test.xhtml",
            markup,
        }
    }

    #[test]
    fn test_extract_section_text() {
        let html = r#"<html><body><h1>Chapter Title</h1><p>This is chapter content.</p></body></html>"#;
        let result = extract_section_text(&section(html));
        assert!(result.contains("Chapter Title"));
        assert!(result.contains("chapter content"));
    }

    #[test]
    fn test_whitespace_only_section_is_empty() {
        let html = "<html><body>\n   \n\t</body></html>";
        assert_eq!(extract_section_text(&section(html)), "");
    }

    #[test]
    fn test_parsed_document_reads_body_only() {
        let xhtml = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Ignored</title><style>p {}</style></head>
<body><p>First</p>
<p>Second</p><script>var x;</script></body></html>"#;
        let text = parsed_document(&section(xhtml)).unwrap();
        assert_eq!(text, "First\nSecond");
    }

    #[test]
    fn test_parsed_document_rejects_html_entities() {
        assert!(parsed_document(&section("<html><body>a&nbsp;b</body></html>")).is_none());
    }

    #[test]
    fn test_raw_contents_tolerates_html() {
        let html = "<html><head><title>T</title></head><body><p>one&nbsp;two<br>three</p></body></html>";
        let text = raw_contents(&section(html)).unwrap();
        assert_eq!(text, "one\u{a0}twothree");
    }

    #[test]
    fn test_body_query_strips_tags() {
        let html = "<html><body class=\"x\"><div>Hello <b>bold</b> &amp; more</div><script>no()</script></body></html>";
        assert_eq!(body_query(&section(html)).unwrap(), "Hello bold & more");
    }

    #[test]
    fn test_body_query_without_body() {
        assert!(body_query(&section("<p>fragment</p>")).is_none());
    }

    #[test]
    fn test_strategies_run_in_order() {
        fn empty(_: &Section) -> Option<String> {
            Some("   ".to_string())
        }
        fn missing(_: &Section) -> Option<String> {
            None
        }
        fn fixed(_: &Section) -> Option<String> {
            Some(" picked ".to_string())
        }
        fn never(_: &Section) -> Option<String> {
            panic!("strategies after a hit must not run")
        }
        let strategies = [
            TextStrategy { name: "empty", extract: empty },
            TextStrategy { name: "missing", extract: missing },
            TextStrategy { name: "fixed", extract: fixed },
            TextStrategy { name: "never", extract: never },
        ];
        assert_eq!(extract_with(&section("<body/>"), &strategies), "picked");
    }
}
