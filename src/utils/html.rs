// src/utils/html.rs

use ammonia;

/// Sanitizes staff-authored rich text (question text, homework instructions).
///
/// Whitelist based: safe formatting tags survive, `<script>` and event-handler
/// attributes are stripped. Student answers are stored verbatim and must be
/// escaped by whoever renders them.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Trims and sanitizes an optional field, mapping blank input to `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(clean_html)
}
