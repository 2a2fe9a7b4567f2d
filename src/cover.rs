//! Generated placeholder covers for books that do not declare one.

use crate::text_processor::{char_count, first_grapheme_upper};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub const COVER_WIDTH: u32 = 200;
pub const COVER_HEIGHT: u32 = 300;

const PALETTE: [&str; 6] = ["#2563eb", "#dc2626", "#16a34a", "#9333ea", "#ea580c", "#0891b2"];

/// Background color picked by the title's character length.
pub fn cover_color(title: &str) -> &'static str {
    PALETTE[char_count(title) % PALETTE.len()]
}

/// SVG markup: a solid rectangle with the title's first character centered
/// in white.
pub fn cover_svg(title: &str) -> String {
    let letter = first_grapheme_upper(title).unwrap_or_default();
    format!(
        r#"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg"><rect width="{w}" height="{h}" fill="{color}"/><text x="50%" y="50%" font-family="Arial, sans-serif" font-size="120" font-weight="bold" fill="white" text-anchor="middle" dominant-baseline="middle">{letter}</text></svg>"#,
        w = COVER_WIDTH,
        h = COVER_HEIGHT,
        color = cover_color(title),
        letter = escape_xml(&letter),
    )
}

pub fn generate_cover(title: &str) -> String {
    format!("data:image/svg+xml;base64,{}", BASE64.encode(cover_svg(title)))
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
