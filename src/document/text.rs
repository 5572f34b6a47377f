//! Byte offset to line/column conversion.

use crate::diagnostic::SourcePosition;

/// Pre-computed line starts for a source text.
///
/// Columns are counted in UTF-16 code units so that positions translate
/// directly into LSP positions.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    /// Convert a byte offset to a 1-based position.
    ///
    /// Offsets past the end of the text clamp to the end.
    pub fn position(&self, offset: usize) -> SourcePosition {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        let column: usize = self.source[line_start..]
            .char_indices()
            .take_while(|(i, _)| line_start + i < offset)
            .map(|(_, c)| c.len_utf16())
            .sum();

        SourcePosition::new(line as u32 + 1, column as u32 + 1)
    }

    /// Convert a byte span to a pair of 1-based positions.
    pub fn span(&self, span: &std::ops::Range<usize>) -> (SourcePosition, SourcePosition) {
        (self.position(span.start), self.position(span.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let idx = LineIndex::new("hello world");
        assert_eq!(idx.position(0), SourcePosition::new(1, 1));
        assert_eq!(idx.position(5), SourcePosition::new(1, 6));
        assert_eq!(idx.position(11), SourcePosition::new(1, 12));
    }

    #[test]
    fn multi_line() {
        let idx = LineIndex::new("hello\nworld\ntest");
        assert_eq!(idx.position(5), SourcePosition::new(1, 6));
        assert_eq!(idx.position(6), SourcePosition::new(2, 1));
        assert_eq!(idx.position(11), SourcePosition::new(2, 6));
        assert_eq!(idx.position(12), SourcePosition::new(3, 1));
    }

    #[test]
    fn utf16_columns() {
        // The emoji is 4 bytes in UTF-8 and 2 code units in UTF-16.
        let idx = LineIndex::new("a\u{1F600}b");
        assert_eq!(idx.position(1), SourcePosition::new(1, 2));
        assert_eq!(idx.position(5), SourcePosition::new(1, 4));
    }

    #[test]
    fn clamps_past_end() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.position(100), SourcePosition::new(2, 3));
    }

    #[test]
    fn span_positions() {
        let idx = LineIndex::new("hello\nworld");
        let (start, end) = idx.span(&(6..11));
        assert_eq!(start, SourcePosition::new(2, 1));
        assert_eq!(end, SourcePosition::new(2, 6));
    }
}
