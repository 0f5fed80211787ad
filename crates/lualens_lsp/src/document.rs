//! Per-document state: the parsed document plus its analysis, rebuilt
//! on every change.

use tower_lsp::lsp_types::{Position, Range};

use lualens_core::analyzer::{analyze, Analysis, AnalyzerOptions};
use lualens_core::document::Document;
use lualens_core::syntax::Span;

pub struct DocumentState {
    pub document: Document,
    pub analysis: Analysis,
    pub options: AnalyzerOptions,
}

impl DocumentState {
    pub fn new(uri: &str, source: String, version: i32, options: AnalyzerOptions) -> Self {
        let document = Document::with_version(uri, source, version);
        let analysis = analyze(&document, &options);
        DocumentState {
            document,
            analysis,
            options,
        }
    }

    /// Replace the text and re-run analysis.
    pub fn update(&mut self, source: String, version: i32) {
        self.document = Document::with_version(self.document.uri().to_string(), source, version);
        self.analysis = analyze(&self.document, &self.options);
    }

    pub fn version(&self) -> i32 {
        self.document.version()
    }

    pub fn offset_of(&self, position: Position) -> usize {
        self.document
            .position_to_offset(lualens_core::document::Position {
                line: position.line,
                character: position.character,
            })
    }

    pub fn lsp_position(&self, offset: usize) -> Position {
        let position = self.document.offset_to_position(offset);
        Position {
            line: position.line,
            character: position.character,
        }
    }

    pub fn lsp_range(&self, span: Span) -> Range {
        Range {
            start: self.lsp_position(span.start),
            end: self.lsp_position(span.end),
        }
    }

    /// The identifier word at `position`, with its span.
    pub fn word_at(&self, position: Position) -> Option<(String, Span)> {
        self.document
            .word_at(lualens_core::document::Position {
                line: position.line,
                character: position.character,
            })
    }

    /// The dotted path ending at the word that covers `position`:
    /// hovering `user` in `context.user` yields `["context", "user"]`.
    pub fn member_path_at(&self, position: Position) -> Option<(Vec<String>, Span)> {
        let (word, span) = self.word_at(position)?;
        let mut path = vec![word];
        let bytes = self.document.text().as_bytes();
        let mut cursor = span.start;
        while cursor > 0 && (bytes[cursor - 1] == b'.' || bytes[cursor - 1] == b':') {
            let mut end = cursor - 1;
            let mut start = end;
            while start > 0 {
                let b = bytes[start - 1];
                if b == b'_' || b.is_ascii_alphanumeric() {
                    start -= 1;
                } else {
                    break;
                }
            }
            if start == end {
                break;
            }
            let segment = &self.document.text()[start..end];
            if segment
                .bytes()
                .next()
                .map(|b| b.is_ascii_digit())
                .unwrap_or(true)
            {
                break;
            }
            path.push(segment.to_string());
            cursor = start;
        }
        path.reverse();
        Some((path, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_doc(source: &str) -> DocumentState {
        DocumentState::new(
            "file:///hook.lua",
            source.to_string(),
            1,
            AnalyzerOptions::default(),
        )
    }

    #[test]
    fn new_document_runs_analysis() {
        let doc = make_doc("local x = 1\nreturn x");
        assert!(doc.analysis.success);
        assert!(doc.analysis.symbols.symbols().iter().any(|s| s.name == "x"));
    }

    #[test]
    fn update_replaces_analysis() {
        let mut doc = make_doc("local x = 1\nreturn x");
        doc.update("local y = \"s\"\nreturn y".to_string(), 2);
        assert_eq!(doc.version(), 2);
        assert!(doc.analysis.symbols.symbols().iter().all(|s| s.name != "x"));
        assert!(doc.analysis.symbols.symbols().iter().any(|s| s.name == "y"));
    }

    #[test]
    fn member_path_at_walks_back_over_dots() {
        let doc = make_doc("return context.user.email");
        // Position on "email".
        let (path, _) = doc
            .member_path_at(Position {
                line: 0,
                character: 21,
            })
            .expect("path under cursor");
        assert_eq!(path, vec!["context", "user", "email"]);
    }

    #[test]
    fn member_path_at_plain_word() {
        let doc = make_doc("return context");
        let (path, _) = doc
            .member_path_at(Position {
                line: 0,
                character: 9,
            })
            .expect("word under cursor");
        assert_eq!(path, vec!["context"]);
    }

    #[test]
    fn bad_syntax_still_produces_state() {
        let doc = make_doc("local = nope");
        assert!(!doc.analysis.success);
        assert!(!doc.analysis.diagnostics.is_empty());
    }
}
