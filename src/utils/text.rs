// src/utils/text.rs

//! Text helpers for raw upstream bodies.

use unicode_segmentation::UnicodeSegmentation;

/// Anti-JSON-hijacking prefix some endpoints put in front of their payload.
const JSON_GUARD: &str = "for (;;);";

/// Remove the hijacking guard and surrounding whitespace.
pub fn strip_json_guard(body: &str) -> &str {
    let body = body.trim_start();
    body.strip_prefix(JSON_GUARD).unwrap_or(body).trim()
}

/// First `max` grapheme clusters of `text`, for log lines.
pub fn preview(text: &str, max: usize) -> &str {
    match text.grapheme_indices(true).nth(max) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Decode the contents of a JSON string literal captured without its quotes.
///
/// Falls back to the raw capture when it is not a valid literal body.
pub fn unescape_json_fragment(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
