//! Display-text cleaning for backend-sourced content.
//!
//! The agent backend returns email bodies and chat replies that may carry
//! raw HTML tags or Markdown emphasis markers. Views render plain text, so
//! everything backend-sourced passes through [`clean`] first. The pass is
//! deliberately literal: tags matching `<[^>]*>` are dropped wholesale,
//! then the pair markers (`**`, `__`) before their singletons (`*`, `_`).
//! Entities are not decoded and an unclosed `<` is left as-is.

use regex::Regex;
use std::sync::OnceLock;

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn tag_pattern() -> &'static Regex {
    TAG_PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Strip HTML tags and Markdown emphasis markers for display.
///
/// Pure and total; cleaning an already-clean string is a no-op.
pub fn clean(input: &str) -> String {
    let stripped = tag_pattern().replace_all(input, "");
    stripped
        .replace("**", "")
        .replace('*', "")
        .replace("__", "")
        .replace('_', "")
}

/// [`clean`] over an optional value; absent input yields the empty string.
pub fn clean_opt(input: Option<&str>) -> String {
    input.map(clean).unwrap_or_default()
}
