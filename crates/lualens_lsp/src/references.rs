//! Find-all-references over the analyzer's symbol table.

use tower_lsp::lsp_types::{Location, Position, Url};

use lualens_core::syntax::Span;

use crate::document::DocumentState;

pub fn find_references(
    doc: &DocumentState,
    position: Position,
    uri: &Url,
    include_declaration: bool,
) -> Vec<Location> {
    let Some((word, span)) = doc.word_at(position) else {
        return vec![];
    };
    let Some((declaration, references)) = doc
        .analysis
        .symbols
        .lookup(&word, Some(span.start))
        .map(|symbol| (symbol.span, symbol.references.clone()))
    else {
        return vec![];
    };

    let mut locations = Vec::new();
    if include_declaration && !declaration.is_empty() {
        locations.push(Location {
            uri: uri.clone(),
            range: doc.lsp_range(declaration),
        });
    }
    for offset in references {
        locations.push(Location {
            uri: uri.clone(),
            range: doc.lsp_range(Span::new(offset, offset + word.len())),
        });
    }
    locations
}
