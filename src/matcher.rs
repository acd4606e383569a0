use crate::error::Result;
use regex::Regex;

/// A compiled per-line matcher for one search query.
///
/// Literal queries are escaped so every metacharacter matches itself.
/// `whole_word` wraps the effective pattern in word-boundary assertions;
/// `case_insensitive` folds pattern and input.
#[derive(Debug)]
pub struct ContentMatcher {
    regex: Regex,
}

/// One match within a line: 0-based byte offset plus the matched slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'t> {
    pub start: usize,
    pub text: &'t str,
}

impl ContentMatcher {
    pub fn compile(
        query: &str,
        is_regex: bool,
        case_insensitive: bool,
        whole_word: bool,
    ) -> Result<Self> {
        let mut pattern = if is_regex {
            query.to_string()
        } else {
            regex::escape(query)
        };
        if whole_word {
            // Group first so boundaries wrap alternations as a whole.
            pattern = format!(r"\b(?:{pattern})\b");
        }
        if case_insensitive {
            pattern = format!("(?i){pattern}");
        }
        let regex = Regex::new(&pattern)?;
        Ok(ContentMatcher { regex })
    }

    /// Yields non-overlapping matches, leftmost first. Each search resumes
    /// immediately after the previous match's end.
    pub fn find<'a>(&'a self, line: &'a str) -> impl Iterator<Item = Span<'a>> + 'a {
        self.regex
            .find_iter(line)
            .map(|m| Span { start: m.start(), text: m.as_str() })
    }
}
