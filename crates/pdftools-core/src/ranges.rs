//! Page range parsing and validation
//!
//! Range expressions look like `"1-3, 5, 8-10"`. Parsing is permissive:
//! malformed tokens are dropped and the rest of the expression is kept.
//! [`parse_ranges_verbose`] also returns why each dropped token was rejected.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, RangeError};

/// An inclusive, 1-based `[start, end]` pair of local page numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageSpan {
    pub start: u32,
    pub end: u32,
}

impl PageSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(page: u32) -> Self {
        Self::new(page, page)
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl std::fmt::Display for PageSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A span that becomes its own output file when splitting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
    pub output_name: String,
}

impl PageRange {
    pub fn new(start: u32, end: u32, output_name: impl Into<String>) -> Self {
        Self {
            start,
            end,
            output_name: output_name.into(),
        }
    }

    /// Name the range `<stem>_pages_<start>-<end>.pdf`
    pub fn with_default_name(span: PageSpan, document_stem: &str) -> Self {
        Self::new(
            span.start,
            span.end,
            format!("{}_pages_{}-{}.pdf", document_stem, span.start, span.end),
        )
    }

    pub fn span(&self) -> PageSpan {
        PageSpan::new(self.start, self.end)
    }
}

/// What a selection may cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    /// At least one page
    NonEmpty,
    /// At least one page, but never the whole document
    Partial,
}

/// Parse a range expression, silently dropping malformed tokens
pub fn parse_ranges(expression: &str) -> Vec<PageSpan> {
    let (spans, rejected) = parse_ranges_verbose(expression);
    for error in &rejected {
        tracing::warn!(%error, expression, "Dropped page range token");
    }
    spans
}

/// Parse a range expression, returning accepted spans in input order and
/// the reasons for every dropped token
pub fn parse_ranges_verbose(expression: &str) -> (Vec<PageSpan>, Vec<ParseError>) {
    let mut spans = Vec::new();
    let mut rejected = Vec::new();

    if expression.trim().is_empty() {
        return (spans, rejected);
    }

    for part in expression.split(',') {
        match parse_token(part.trim()) {
            Ok(span) => spans.push(span),
            Err(e) => rejected.push(e),
        }
    }

    (spans, rejected)
}

fn parse_token(token: &str) -> Result<PageSpan, ParseError> {
    if token.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some((start, end)) = token.split_once('-') {
        let start = parse_number(start.trim()).ok_or_else(|| ParseError::Malformed(token.into()))?;
        let end = parse_number(end.trim()).ok_or_else(|| ParseError::Malformed(token.into()))?;
        if start > end {
            return Err(ParseError::Reversed { start, end });
        }
        Ok(PageSpan::new(start, end))
    } else {
        parse_number(token)
            .map(PageSpan::single)
            .ok_or_else(|| ParseError::NotANumber(token.into()))
    }
}

/// Whole-token digits only: "3abc" is rejected rather than read as 3
fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Render spans in canonical form: `"s"` or `"s-e"`, joined by `", "`
pub fn format_ranges(spans: &[PageSpan]) -> String {
    spans
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Expand spans into the set of pages they cover, ignoring pages outside
/// `1..=page_count`
pub fn pages_in(spans: &[PageSpan], page_count: u32) -> BTreeSet<u32> {
    spans
        .iter()
        .flat_map(|s| s.start.max(1)..=s.end.min(page_count))
        .collect()
}

/// Check split ranges against a document: bounds first, then overlap, then
/// output names
pub fn validate_ranges(ranges: &[PageRange], page_count: u32) -> Result<(), RangeError> {
    for range in ranges {
        if range.start < 1 || range.end > page_count || range.start > range.end {
            return Err(RangeError::OutOfBounds {
                start: range.start,
                end: range.end,
                page_count,
            });
        }
    }

    let mut sorted: Vec<&PageRange> = ranges.iter().collect();
    sorted.sort_by_key(|r| (r.start, r.end));
    for pair in sorted.windows(2) {
        if pair[0].end >= pair[1].start {
            return Err(RangeError::Overlap {
                first: pair[0].span().to_string(),
                second: pair[1].span().to_string(),
            });
        }
    }

    for (index, range) in ranges.iter().enumerate() {
        if range.output_name.trim().is_empty() {
            return Err(RangeError::EmptyName { index });
        }
    }

    Ok(())
}

/// Check a set of local pages chosen for an operation
pub fn validate_selection(
    selection: &BTreeSet<u32>,
    page_count: u32,
    rule: SelectionRule,
) -> Result<(), RangeError> {
    if let Some(&page) = selection.iter().find(|&&p| p < 1 || p > page_count) {
        return Err(RangeError::OutOfBounds {
            start: page,
            end: page,
            page_count,
        });
    }

    let selected = selection.len();
    let full = selected as u64 == u64::from(page_count);
    if selected == 0 || (rule == SelectionRule::Partial && full) {
        return Err(RangeError::EmptyOrFull {
            selected,
            page_count,
        });
    }

    Ok(())
}
