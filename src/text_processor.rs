use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub normalize_unicode: bool,
    pub strip_bom: bool,
    pub remove_control_chars: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            normalize_unicode: false,
            strip_bom: true,
            remove_control_chars: true,
        }
    }
}

/// Clean decoded text without touching its line structure.
pub fn clean_text(text: &str, options: Option<&CleanOptions>) -> String {
    let default_opts = CleanOptions::default();
    let opts = options.unwrap_or(&default_opts);
    let mut result = text;

    if opts.strip_bom {
        result = result.strip_prefix('\u{feff}').unwrap_or(result);
    }

    let mut result = if opts.normalize_unicode {
        result.nfc().collect::<String>()
    } else {
        result.to_string()
    };

    if opts.remove_control_chars {
        result = remove_control_characters(result);
    }

    result
}

/// Join every whitespace-separated fragment with a single space.
///
/// Line and paragraph breaks are lost; paginated extraction relies on this.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tidy text pulled out of markup: trims each line, keeps at most one blank
/// line between paragraphs, trims the whole.
pub fn tidy_extracted_text(text: &str) -> String {
    let joined = normalize_line_endings(text)
        .lines()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n");

    RE_BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

/// First user-perceived character, upper-cased.
pub fn first_grapheme_upper(text: &str) -> Option<String> {
    text.trim()
        .graphemes(true)
        .next()
        .map(|grapheme| grapheme.to_uppercase())
}

/// Length as the reader counts it: Unicode scalar values.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

fn remove_control_characters(text: String) -> String {
    if !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\t' | '\r'))
    {
        return text;
    }
    text.chars()
        .filter(|c| !c.is_control() || matches!(*c, '\n' | '\t' | '\r'))
        .collect()
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
