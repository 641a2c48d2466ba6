//! Marker regions and text edits
//!
//! The generator owns the lines strictly between a `START` and an `END`
//! marker; everything else in the file is carried over byte for byte.

use crate::error::{DepotError, DepotResult};
use proc_macro2::LineColumn;
use std::cmp::Reverse;
use std::ops::Range;

pub const MARKER_PREFIX: &str = "// AUTO-GENERATED: ";

/// A generator-owned region of a record's `impl` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Fields,
    Methods,
}

impl Region {
    pub fn start_label(self) -> &'static str {
        match self {
            Self::Fields => "FIELDS START",
            Self::Methods => "METHODS START",
        }
    }

    pub fn end_label(self) -> &'static str {
        match self {
            Self::Fields => "FIELDS END",
            Self::Methods => "METHODS END",
        }
    }

    pub fn start_marker(self) -> String {
        format!("{MARKER_PREFIX}{}", self.start_label())
    }

    pub fn end_marker(self) -> String {
        format!("{MARKER_PREFIX}{}", self.end_label())
    }
}

/// Byte offsets of line starts, for mapping parser positions into the text
pub struct LineIndex<'t> {
    text: &'t str,
    starts: Vec<usize>,
}

impl<'t> LineIndex<'t> {
    pub fn new(text: &'t str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Byte offset of the start of `line` (0-based); the text length past the end
    pub fn line_start(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(self.text.len())
    }

    /// Text of `line` without its newline
    pub fn line(&self, line: usize) -> &'t str {
        let start = self.line_start(line);
        let end = self
            .starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);
        self.text[start..end].trim_end_matches('\r')
    }

    /// 0-based line holding byte `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    /// Byte offset of a parser position (1-based line, column in chars)
    pub fn offset(&self, position: LineColumn) -> usize {
        let start = self.line_start(position.line.saturating_sub(1));
        self.text[start..]
            .char_indices()
            .nth(position.column)
            .map_or(self.text.len(), |(i, _)| start + i)
    }

    /// Leading whitespace of `line`
    pub fn indentation(&self, line: usize) -> &'t str {
        let text = self.line(line);
        &text[..text.len() - text.trim_start().len()]
    }
}

/// 0-based lines of one `START`/`END` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPair {
    pub start: usize,
    pub end: usize,
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.trim() == marker
}

/// Check that every `START` of `region` in the file is closed by an `END`
/// before the next `START`, and vice versa
pub fn check_balanced(index: &LineIndex<'_>, region: Region) -> DepotResult<()> {
    let (start, end) = (region.start_marker(), region.end_marker());
    let mut open: Option<usize> = None;

    for line in 0..index.line_count() {
        let text = index.line(line);
        if is_marker(text, &start) {
            if let Some(open_line) = open {
                return Err(mismatch(region.start_label(), region.end_label(), open_line));
            }
            open = Some(line);
        } else if is_marker(text, &end) {
            if open.take().is_none() {
                return Err(mismatch(region.end_label(), region.start_label(), line));
            }
        }
    }

    match open {
        Some(line) => Err(mismatch(region.start_label(), region.end_label(), line)),
        None => Ok(()),
    }
}

fn mismatch(found: &'static str, missing: &'static str, line: usize) -> DepotError {
    DepotError::MarkerMismatch {
        found,
        missing,
        line: line + 1,
    }
}

/// First marker pair of `region` within `lines`
///
/// Assumes [`check_balanced`] already passed for the whole file.
pub fn find_pair(
    index: &LineIndex<'_>,
    region: Region,
    lines: Range<usize>,
) -> Option<MarkerPair> {
    let (start_marker, end_marker) = (region.start_marker(), region.end_marker());
    let start = lines
        .clone()
        .find(|&line| is_marker(index.line(line), &start_marker))?;
    let end = (start + 1..lines.end).find(|&line| is_marker(index.line(line), &end_marker))?;
    Some(MarkerPair { start, end })
}

/// Replacement of one byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn insert(at: usize, text: String) -> Self {
        Self {
            range: at..at,
            text,
        }
    }

    /// Replace everything strictly between the marker lines of `pair`
    pub fn between(index: &LineIndex<'_>, pair: MarkerPair, text: String) -> Self {
        Self {
            range: index.line_start(pair.start + 1)..index.line_start(pair.end),
            text,
        }
    }
}

/// Apply non-overlapping edits to `text`
///
/// Edits inserting at the same offset land in the order given.
pub fn apply(text: &str, edits: Vec<Edit>) -> String {
    // back to front so earlier offsets stay valid
    let mut edits: Vec<(usize, Edit)> = edits.into_iter().enumerate().collect();
    edits.sort_by_key(|(order, edit)| (Reverse(edit.range.start), Reverse(*order)));
    let mut output = text.to_string();
    for (_, edit) in edits {
        output.replace_range(edit.range, &edit.text);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "impl A {\n    // AUTO-GENERATED: FIELDS START\n    old\n    // AUTO-GENERATED: FIELDS END\n}\n";

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\n\nxé");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.line(1), "cd");
        assert_eq!(index.line(2), "");
        assert_eq!(index.line_of(4), 1);
        assert_eq!(index.offset(LineColumn { line: 4, column: 1 }), 8);
        assert_eq!(index.offset(LineColumn { line: 4, column: 2 }), 10);
    }

    #[test]
    fn test_replace_between_markers() {
        let index = LineIndex::new(SOURCE);
        let pair = find_pair(&index, Region::Fields, 0..index.line_count()).unwrap();
        assert_eq!(pair, MarkerPair { start: 1, end: 3 });

        let edit = Edit::between(&index, pair, "    new\n    lines\n".to_string());
        assert_eq!(
            apply(SOURCE, vec![edit]),
            "impl A {\n    // AUTO-GENERATED: FIELDS START\n    new\n    lines\n    // AUTO-GENERATED: FIELDS END\n}\n"
        );
        assert_eq!(find_pair(&index, Region::Methods, 0..index.line_count()), None);
    }

    #[test]
    fn test_unbalanced_markers() {
        let missing_end = "// AUTO-GENERATED: METHODS START\nfn a() {}\n";
        assert!(matches!(
            check_balanced(&LineIndex::new(missing_end), Region::Methods),
            Err(DepotError::MarkerMismatch {
                found: "METHODS START",
                missing: "METHODS END",
                line: 1,
            })
        ));

        let missing_start = "fn a() {}\n    // AUTO-GENERATED: FIELDS END\n";
        assert!(matches!(
            check_balanced(&LineIndex::new(missing_start), Region::Fields),
            Err(DepotError::MarkerMismatch {
                found: "FIELDS END",
                line: 2,
                ..
            })
        ));

        assert!(check_balanced(&LineIndex::new(SOURCE), Region::Fields).is_ok());
    }

    #[test]
    fn test_edits_apply_back_to_front() {
        let edits = vec![
            Edit::insert(0, "<".to_string()),
            Edit::insert(3, ">".to_string()),
            Edit {
                range: 1..2,
                text: "BB".to_string(),
            },
        ];
        assert_eq!(apply("abc", edits), "<aBBc>");

        let same_spot = vec![Edit::insert(1, "x".to_string()), Edit::insert(1, "y".to_string())];
        assert_eq!(apply("ab", same_spot), "axyb");
    }
}
