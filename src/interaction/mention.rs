//! Bot mention detection and stripping.

/// Whether `text` mentions the bot anywhere (case-sensitive, unanchored).
pub fn contains_mention(text: &str, marker: &str) -> bool {
    text.contains(marker)
}

/// Removes one leading `marker` and the whitespace after it.
///
/// Text that does not start with the marker is returned unchanged.
pub fn strip_leading_mention<'a>(text: &'a str, marker: &str) -> &'a str {
    match text.strip_prefix(marker) {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}

// Tests.
