//! Go-to-definition.
//!
//! Locals resolve to their declaration range; globals, libraries, and
//! sandbox members resolve to a synthetic builtin URI supplied by the
//! registry, which the editor shell renders as generated
//! documentation.

use tower_lsp::lsp_types::{GotoDefinitionResponse, Location, Position, Range, Url};

use lualens_core::definitions::Definitions;
use lualens_core::symbols::SymbolKind;

use crate::document::DocumentState;

pub fn goto_definition(
    doc: &DocumentState,
    position: Position,
    uri: &Url,
) -> Option<GotoDefinitionResponse> {
    let (path, span) = doc.member_path_at(position)?;
    let word = path.last()?.clone();

    // Script-declared symbols win for bare identifiers.
    if path.len() == 1 {
        if let Some(symbol) = doc.analysis.symbols.lookup(&word, Some(span.start)) {
            if symbol.kind != SymbolKind::Global || !symbol.span.is_empty() {
                return Some(GotoDefinitionResponse::Scalar(Location {
                    uri: uri.clone(),
                    range: doc.lsp_range(symbol.span),
                }));
            }
        }
    }

    // Builtins: jump to the registry's synthetic URI for the root.
    let defs = Definitions::global();
    let root = path.first()?;
    let builtin = defs.builtin_uri_for(root)?;
    let target = Url::parse(&builtin).ok()?;
    Some(GotoDefinitionResponse::Scalar(Location {
        uri: target,
        range: Range {
            start: Position::new(0, 0),
            end: Position::new(0, 0),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lualens_core::analyzer::AnalyzerOptions;

    fn make_doc(source: &str) -> DocumentState {
        DocumentState::new(
            "file:///hook.lua",
            source.to_string(),
            1,
            AnalyzerOptions::default(),
        )
    }

    fn test_uri() -> Url {
        Url::parse("file:///hook.lua").unwrap()
    }

    #[test]
    fn definition_of_local() {
        let doc = make_doc("local answer = 42\nreturn answer");
        let result = goto_definition(&doc, Position { line: 1, character: 9 }, &test_uri());
        let Some(GotoDefinitionResponse::Scalar(location)) = result else {
            panic!("expected a single location");
        };
        assert_eq!(location.uri, test_uri());
        assert_eq!(location.range.start.line, 0);
        assert_eq!(location.range.start.character, 6);
    }

    #[test]
    fn definition_of_sandbox_item_is_builtin_uri() {
        let doc = make_doc("helpers.log(\"x\")");
        let result = goto_definition(&doc, Position { line: 0, character: 3 }, &test_uri());
        let Some(GotoDefinitionResponse::Scalar(location)) = result else {
            panic!("expected a single location");
        };
        assert_eq!(location.uri.scheme(), "lualens");
    }

    #[test]
    fn definition_of_sandbox_member_uses_root_uri() {
        let doc = make_doc("helpers.log(\"x\")");
        let result = goto_definition(&doc, Position { line: 0, character: 9 }, &test_uri());
        let Some(GotoDefinitionResponse::Scalar(location)) = result else {
            panic!("expected a single location");
        };
        assert_eq!(location.uri.as_str(), "lualens://builtins/helpers");
    }

    #[test]
    fn definition_of_global_builtin() {
        let doc = make_doc("print(\"x\")");
        let result = goto_definition(&doc, Position { line: 0, character: 2 }, &test_uri());
        let Some(GotoDefinitionResponse::Scalar(location)) = result else {
            panic!("expected a single location");
        };
        assert!(location.uri.as_str().starts_with("lualens://builtins/"));
    }

    #[test]
    fn no_definition_for_unknown_word() {
        let doc = make_doc("return mystery");
        let result = goto_definition(&doc, Position { line: 0, character: 9 }, &test_uri());
        assert!(result.is_none());
    }

    #[test]
    fn no_definition_in_whitespace() {
        let doc = make_doc("local x = 1");
        let result = goto_definition(&doc, Position { line: 0, character: 5 }, &test_uri());
        // Position 5 is the space between `local` and `x`; the word
        // under the cursor is `local`, a keyword with no definition.
        assert!(result.is_none());
    }
}
