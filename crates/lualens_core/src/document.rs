//! Source documents: text, line index, and the memoized parse.
//!
//! A document is immutable; edits produce a new instance with a bumped
//! version. Positions are LSP-style (0-indexed line, UTF-16 character),
//! offsets are byte offsets into the UTF-8 text.

use std::sync::OnceLock;

use crate::syntax::{parse_chunk, Block, ParseFailure, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// A single text replacement, applied through [`Document::apply_changes`].
#[derive(Debug, Clone)]
pub struct TextEdit {
    pub range: Range,
    pub text: String,
}

#[derive(Debug)]
struct ParseOutcome {
    ast: Option<Block>,
    failure: Option<ParseFailure>,
}

/// Canonical source-of-truth for one script buffer.
pub struct Document {
    uri: String,
    text: String,
    version: i32,
    /// Byte offset of each line start; `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
    parse: OnceLock<ParseOutcome>,
}

impl Document {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_version(uri, text, 0)
    }

    pub fn with_version(uri: impl Into<String>, text: impl Into<String>, version: i32) -> Self {
        let text = text.into();
        let line_starts = compute_line_starts(&text);
        Document {
            uri: uri.into(),
            text,
            version,
            line_starts,
            parse: OnceLock::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The text of line `n` (0-indexed), without its trailing newline.
    pub fn line(&self, n: usize) -> Option<&str> {
        let start = *self.line_starts.get(n)?;
        let end = self
            .line_starts
            .get(n + 1)
            .copied()
            .unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Text covered by `span`, clamped to the document.
    pub fn text_in_span(&self, span: Span) -> &str {
        let start = span.start.min(self.text.len());
        let end = span.end.clamp(start, self.text.len());
        &self.text[start..end]
    }

    /// The identifier-shaped word containing (or ending at) `position`.
    pub fn word_at(&self, position: Position) -> Option<(String, Span)> {
        let offset = self.position_to_offset(position);
        let bytes = self.text.as_bytes();
        let is_word = |b: u8| b == b'_' || b.is_ascii_alphanumeric();

        let anchored = (offset < bytes.len() && is_word(bytes[offset]))
            || (offset > 0 && is_word(bytes[offset - 1]));
        if !anchored {
            return None;
        }

        let mut start = offset.min(bytes.len());
        while start > 0 && is_word(bytes[start - 1]) {
            start -= 1;
        }
        let mut end = offset.min(bytes.len());
        while end < bytes.len() && is_word(bytes[end]) {
            end += 1;
        }
        let word = &self.text[start..end];
        let first = word.bytes().next()?;
        if first.is_ascii_digit() {
            return None;
        }
        Some((word.to_string(), Span::new(start, end)))
    }

    /// Convert a position to a byte offset, clamping out-of-range input.
    pub fn position_to_offset(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return self.text.len();
        }
        let line_start = self.line_starts[line];
        let line_end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        let line_text = &self.text[line_start..line_end];

        let target = position.character;
        let mut utf16_offset = 0u32;
        for (byte_idx, ch) in line_text.char_indices() {
            if ch == '\n' || ch == '\r' {
                return line_start + byte_idx;
            }
            if utf16_offset >= target {
                return line_start + byte_idx;
            }
            utf16_offset += ch.len_utf16() as u32;
        }
        line_end
    }

    /// Convert a byte offset to a position, clamping out-of-range input.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        let character = self.text[line_start..offset].encode_utf16().count() as u32;
        Position {
            line: line as u32,
            character,
        }
    }

    pub fn span_to_range(&self, span: Span) -> Range {
        Range {
            start: self.offset_to_position(span.start),
            end: self.offset_to_position(span.end),
        }
    }

    /// The parsed chunk, if a tree is available. A document with a
    /// recorded [`parse_failure`](Self::parse_failure) may still return
    /// a best-effort tree from the recovery pass.
    pub fn ast(&self) -> Option<&Block> {
        self.parse_outcome().ast.as_ref()
    }

    pub fn parse_failure(&self) -> Option<&ParseFailure> {
        self.parse_outcome().failure.as_ref()
    }

    fn parse_outcome(&self) -> &ParseOutcome {
        self.parse.get_or_init(|| match parse_chunk(&self.text) {
            Ok(block) => ParseOutcome {
                ast: Some(block),
                failure: None,
            },
            Err(failure) => {
                // Single recovery attempt: blank the offending line
                // (byte-for-byte, so all other offsets stay put) and
                // re-parse once. Never cascades to further lines.
                let recovered = blank_line(&self.text, failure.line as usize, &self.line_starts);
                match parse_chunk(&recovered) {
                    Ok(block) => {
                        log::debug!(
                            "parse recovered by blanking line {}: {}",
                            failure.line,
                            failure.message
                        );
                        ParseOutcome {
                            ast: Some(block),
                            failure: Some(failure),
                        }
                    }
                    Err(_) => ParseOutcome {
                        ast: None,
                        failure: Some(failure),
                    },
                }
            }
        })
    }

    /// Apply `edits` (sorted internally by descending start) and return
    /// the resulting document with `version + 1`.
    pub fn apply_changes(&self, edits: &[TextEdit]) -> Document {
        let mut resolved: Vec<(usize, usize, &str)> = edits
            .iter()
            .map(|edit| {
                let start = self.position_to_offset(edit.range.start);
                let end = self.position_to_offset(edit.range.end).max(start);
                (start, end, edit.text.as_str())
            })
            .collect();
        resolved.sort_by(|a, b| b.0.cmp(&a.0));

        let mut text = self.text.clone();
        for (start, end, replacement) in resolved {
            text.replace_range(start..end, replacement);
        }
        Document::with_version(self.uri.clone(), text, self.version + 1)
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Replace every byte of line `line` (newline excluded) with a space.
fn blank_line(text: &str, line: usize, line_starts: &[usize]) -> String {
    let Some(&start) = line_starts.get(line) else {
        return text.to_string();
    };
    let end = line_starts.get(line + 1).copied().unwrap_or(text.len());
    let mut bytes = text.as_bytes().to_vec();
    for b in &mut bytes[start..end] {
        if *b != b'\n' && *b != b'\r' {
            *b = b' ';
        }
    }
    // Only ASCII spaces were written; the rest is untouched UTF-8.
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("file:///hook.lua", text)
    }

    #[test]
    fn position_offset_roundtrip() {
        let d = doc("local x = 1\nreturn x\n");
        for offset in 0..d.text().len() {
            let pos = d.offset_to_position(offset);
            assert_eq!(
                d.position_to_offset(pos),
                offset,
                "roundtrip failed at offset {offset}"
            );
        }
    }

    #[test]
    fn position_roundtrip_with_multibyte() {
        // 'é' is 2 UTF-8 bytes but 1 UTF-16 unit.
        let d = doc("local café = 1\nreturn café\n");
        for offset in 0..d.text().len() {
            if !d.text().is_char_boundary(offset) {
                continue;
            }
            let pos = d.offset_to_position(offset);
            assert_eq!(d.position_to_offset(pos), offset);
        }
    }

    #[test]
    fn out_of_range_positions_clamp() {
        let d = doc("abc");
        assert_eq!(d.position_to_offset(Position::new(5, 0)), 3);
        assert_eq!(d.position_to_offset(Position::new(0, 99)), 3);
        assert_eq!(d.offset_to_position(99), Position::new(0, 3));
    }

    #[test]
    fn line_lookup() {
        let d = doc("local x = 1\nreturn x");
        assert_eq!(d.line(0), Some("local x = 1"));
        assert_eq!(d.line(1), Some("return x"));
        assert_eq!(d.line(2), None);
    }

    #[test]
    fn word_at_finds_identifier() {
        let d = doc("local answer = 42");
        let (word, span) = d.word_at(Position::new(0, 8)).expect("word under cursor");
        assert_eq!(word, "answer");
        assert_eq!(d.text_in_span(span), "answer");
    }

    #[test]
    fn word_at_accepts_word_end_boundary() {
        let d = doc("print(x)");
        let (word, _) = d.word_at(Position::new(0, 5)).expect("word before paren");
        assert_eq!(word, "print");
    }

    #[test]
    fn word_at_rejects_whitespace_and_numbers() {
        let d = doc("local x = 42");
        // Between '=' and '42' there is no identifier word.
        assert!(d.word_at(Position::new(0, 9)).is_none());
        // A number literal is not an identifier word.
        assert!(d.word_at(Position::new(0, 11)).is_none());
    }

    #[test]
    fn clean_parse_has_ast_and_no_failure() {
        let d = doc("local x = 1\nreturn x");
        assert!(d.ast().is_some());
        assert!(d.parse_failure().is_none());
    }

    #[test]
    fn recovery_blanks_single_faulty_line() {
        let d = doc("local x = 1\nlocal = nope\nreturn x");
        let failure = d.parse_failure().expect("parse failure recorded");
        assert_eq!(failure.line, 1);
        let ast = d.ast().expect("best-effort tree after recovery");
        // The surviving statements are the local and the return.
        assert_eq!(ast.stats.len(), 2);
    }

    #[test]
    fn recovery_does_not_cascade() {
        let d = doc("local = 1\nlocal = 2\nreturn");
        assert!(d.parse_failure().is_some());
        // Blanking one line cannot fix two faulty lines; no tree results.
        assert!(d.ast().is_none());
    }

    #[test]
    fn recovered_equals_hand_blanked() {
        let broken = doc("local x = 1\nlocal = nope\nreturn x");
        let blanked = doc("local x = 1\n            \nreturn x");
        assert_eq!(broken.ast(), blanked.ast());
    }

    #[test]
    fn apply_changes_bumps_version_and_replaces() {
        let d = doc("local x = 1\nreturn x");
        let edited = d.apply_changes(&[TextEdit {
            range: Range {
                start: Position::new(0, 6),
                end: Position::new(0, 7),
            },
            text: "y".to_string(),
        }]);
        assert_eq!(edited.version(), 1);
        assert_eq!(edited.line(0), Some("local y = 1"));
        // Original document is untouched.
        assert_eq!(d.line(0), Some("local x = 1"));
    }

    #[test]
    fn apply_changes_applies_in_descending_order() {
        let d = doc("abcdef");
        let edited = d.apply_changes(&[
            TextEdit {
                range: Range {
                    start: Position::new(0, 1),
                    end: Position::new(0, 2),
                },
                text: "X".to_string(),
            },
            TextEdit {
                range: Range {
                    start: Position::new(0, 4),
                    end: Position::new(0, 5),
                },
                text: "Y".to_string(),
            },
        ]);
        assert_eq!(edited.text(), "aXcdYf");
    }
}
