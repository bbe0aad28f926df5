//! Page-range parsing and normalization.
//!
//! Sources disagree wildly on how they spell a page range: `"123-145"`,
//! `"pp. 123--145"`, `"pages 123\u{2013}145"`, bare `"3045"` for a
//! single-page entry. Everything funnels through [`PageRange::parse`] and
//! serializes back out in the canonical `start-end` form.

use std::fmt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NUMBERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static STRIP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:pages?|pp?)\s*\.?\s*:?\s*").unwrap());

/// A validated page range: a start page and an optional end page.
///
/// When an end page is present, `start <= end` holds. Serialized as the
/// canonical string form (`"123-145"` or `"123"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PageRange {
    start: u32,
    end: Option<u32>,
}

impl PageRange {
    /// A span of pages. Returns `None` if `start > end`.
    pub fn span(start: u32, end: u32) -> Option<Self> {
        (start <= end).then_some(Self {
            start,
            end: Some(end),
        })
    }

    /// A single-page entry.
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: None,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> Option<u32> {
        self.end
    }

    /// Parse a page range out of free-form text.
    ///
    /// Strips `pages`/`pp.` style prefixes, then takes the first one or two
    /// numbers in the remainder. Two numbers form a span only when they are
    /// in order; out-of-order pairs are rejected rather than swapped, since
    /// they usually mean the text was not a page range at all.
    pub fn parse(text: &str) -> Option<Self> {
        let stripped = STRIP_PREFIX.replace(text.trim(), "");
        let mut nums = NUMBERS
            .find_iter(&stripped)
            .take(2)
            .filter_map(|m| m.as_str().parse::<u32>().ok());
        let first = nums.next()?;
        match nums.next() {
            Some(second) => Self::span(first, second),
            None => Some(Self::single(first)),
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}

impl From<PageRange> for String {
    fn from(r: PageRange) -> String {
        r.to_string()
    }
}

impl TryFrom<String> for PageRange {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PageRange::parse(&s).ok_or_else(|| format!("not a page range: {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_range() {
        assert_eq!(PageRange::parse("123-145"), PageRange::span(123, 145));
    }

    #[test]
    fn double_hyphen_and_dashes() {
        assert_eq!(PageRange::parse("123--145"), PageRange::span(123, 145));
        assert_eq!(PageRange::parse("123\u{2013}145"), PageRange::span(123, 145));
        assert_eq!(PageRange::parse("123\u{2014}145"), PageRange::span(123, 145));
    }

    #[test]
    fn prefixed_forms() {
        assert_eq!(PageRange::parse("pp. 123-145"), PageRange::span(123, 145));
        assert_eq!(PageRange::parse("pages 123-145"), PageRange::span(123, 145));
        assert_eq!(PageRange::parse("Pages: 5998-6008"), PageRange::span(5998, 6008));
        assert_eq!(PageRange::parse("p. 42"), Some(PageRange::single(42)));
    }

    #[test]
    fn single_page() {
        assert_eq!(PageRange::parse("672"), Some(PageRange::single(672)));
        assert_eq!(PageRange::parse("672").unwrap().to_string(), "672");
    }

    #[test]
    fn out_of_order_rejected() {
        assert_eq!(PageRange::parse("145-123"), None);
        assert!(PageRange::span(145, 123).is_none());
    }

    #[test]
    fn no_digits_rejected() {
        assert_eq!(PageRange::parse(""), None);
        assert_eq!(PageRange::parse("n/a"), None);
        assert_eq!(PageRange::parse("online only"), None);
    }

    #[test]
    fn equal_endpoints_allowed() {
        assert_eq!(PageRange::parse("99-99"), PageRange::span(99, 99));
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(PageRange::parse("pp. 123--145").unwrap().to_string(), "123-145");
    }

    #[test]
    fn serde_as_string() {
        let r = PageRange::span(5998, 6008).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"5998-6008\"");
        let back: PageRange = serde_json::from_str("\"pp. 5998-6008\"").unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<PageRange>("\"no pages\"").is_err());
    }
}
