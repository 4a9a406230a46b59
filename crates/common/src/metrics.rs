// Plain-text metrics for HTML document bodies.
//
// Markup stripping is a lossy best-effort pass, not an HTML parser: anything
// shaped like `<...>` goes away. For word and paragraph counting, block-level
// tags leave a newline behind so adjacent blocks stay separate words and
// consecutive blocks form a blank-line paragraph boundary. Characters are
// counted on the text with tags simply removed.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Average reading speed used for the reading-time estimate.
pub const WORDS_PER_MINUTE: usize = 225;

/// Snapshot of content metrics. Derived on demand, never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetrics {
    pub word_count: usize,
    pub character_count: usize,
    pub paragraph_count: usize,
    pub reading_time_minutes: usize,
}

fn block_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)<\s*/?\s*(?:p|div|h[1-6]|li|ul|ol|blockquote|pre|table|tr|section|article|header|footer|hr|br)\b[^>]*>",
        )
        .expect("block tag pattern should compile")
    })
}

fn any_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern should compile"))
}

fn paragraph_break_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph pattern should compile"))
}

/// Remove markup from `content`, keeping block boundaries as newlines.
pub fn strip_markup(content: &str) -> String {
    let blocks = block_tag_pattern().replace_all(content, "\n");
    any_tag_pattern().replace_all(&blocks, "").into_owned()
}

/// Remove every tag without inserting anything in its place.
pub fn remove_tags(content: &str) -> String {
    any_tag_pattern().replace_all(content, "").into_owned()
}

/// Whitespace-separated tokens in already-stripped text.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Characters in already-stripped text, whitespace and punctuation included.
pub fn character_count(text: &str) -> usize {
    text.chars().count()
}

/// Non-blank segments between blank lines in already-stripped text.
pub fn paragraph_count(text: &str) -> usize {
    paragraph_break_pattern()
        .split(text)
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

/// Whole minutes to read `words`, rounded up. Zero words read in zero minutes.
pub fn reading_time_minutes(words: usize) -> usize {
    words.div_ceil(WORDS_PER_MINUTE)
}

/// Compute all metrics for a (possibly marked-up) content string.
pub fn calculate_metrics(content: &str) -> DocumentMetrics {
    let text = strip_markup(content);
    let word_count = word_count(&text);
    DocumentMetrics {
        word_count,
        character_count: character_count(&remove_tags(content)),
        paragraph_count: paragraph_count(&text),
        reading_time_minutes: reading_time_minutes(word_count),
    }
}
