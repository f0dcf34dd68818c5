use regex::{Regex, RegexBuilder};

use crate::model::Row;

/// Filters rows by a pattern made of whitespace-separated words. Every word
/// has to appear in the row, in the order typed, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct MultipartFilter {
    pattern: Option<Regex>,
}

impl MultipartFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_filter_string(&mut self, text: &str) {
        let pattern = build_pattern(text);
        tracing::debug!(%pattern, "new filter pattern");
        // Every token is escaped, so the pattern is always a valid regex.
        self.pattern = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .ok();
    }

    pub fn is_set(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn accepts(&self, text: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(text),
            None => false,
        }
    }

    /// Accepted rows in source order. A `limit` of zero means no limit.
    pub fn filter<'a>(&self, rows: &'a [Row], limit: usize) -> Vec<&'a Row> {
        let accepted = rows.iter().filter(|row| self.accepts(&row.text));
        if limit == 0 {
            accepted.collect()
        } else {
            accepted.take(limit).collect()
        }
    }
}

/// Joins the literal tokens of `text` with `.*`. Leading and trailing
/// whitespace turn into a wildcard too, which is a no-op for an unanchored
/// search.
pub fn build_pattern(text: &str) -> String {
    text.split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}
