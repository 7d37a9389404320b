use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_QUERY_CHARS: usize = 200;

/// Characters stripped from user-supplied product text before resolution.
pub const DENYLIST: [char; 8] = ['<', '>', '{', '}', '|', '\\', '^', '`'];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("product name is empty after sanitization")]
    Empty,
    #[error("product name is {length} characters, limit is {limit}")]
    TooLong { length: usize, limit: usize },
}

/// A sanitized product search. Only constructible through [`Query::new`], so a
/// `Query` in hand always carries non-empty text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    raw_text: String,
    category_hint: Option<String>,
}

impl Query {
    pub fn new(raw_text: &str, category_hint: Option<&str>) -> Result<Self, QueryError> {
        let length = raw_text.chars().count();
        if length > MAX_QUERY_CHARS {
            return Err(QueryError::TooLong { length, limit: MAX_QUERY_CHARS });
        }

        let sanitized = sanitize(raw_text);
        if sanitized.is_empty() {
            return Err(QueryError::Empty);
        }

        let category_hint = category_hint
            .map(sanitize)
            .filter(|hint| !hint.is_empty());

        Ok(Self { raw_text: sanitized, category_hint })
    }

    pub fn text(&self) -> &str {
        &self.raw_text
    }

    pub fn category_hint(&self) -> Option<&str> {
        self.category_hint.as_deref()
    }
}

/// Strips denylisted characters, trims, and collapses whitespace runs.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .filter(|ch| !DENYLIST.contains(ch))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{sanitize, Query, QueryError, MAX_QUERY_CHARS};

    #[test]
    fn strips_denylisted_brackets() {
        assert_eq!(sanitize("iPhone <16> Pro"), "iPhone 16 Pro");
        assert_eq!(sanitize("  {a|b}^c\\d`  "), "abcd");
    }

    #[test]
    fn collapses_whitespace_left_by_stripping() {
        assert_eq!(sanitize("galaxy < s24 >  ultra"), "galaxy s24 ultra");
    }

    #[test]
    fn empty_after_sanitization_is_rejected() {
        assert_eq!(Query::new("  <>{}  ", None), Err(QueryError::Empty));
        assert_eq!(Query::new("", Some("electronics")), Err(QueryError::Empty));
    }

    #[test]
    fn overlong_input_is_rejected_before_sanitization() {
        let input = "<".repeat(MAX_QUERY_CHARS) + "x";

        assert_eq!(
            Query::new(&input, None),
            Err(QueryError::TooLong { length: MAX_QUERY_CHARS + 1, limit: MAX_QUERY_CHARS })
        );
    }

    #[test]
    fn blank_category_hint_is_dropped() {
        let query = Query::new("tata salt", Some("  ")).expect("valid query");

        assert_eq!(query.text(), "tata salt");
        assert_eq!(query.category_hint(), None);
    }
}
