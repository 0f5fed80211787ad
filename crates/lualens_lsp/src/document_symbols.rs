//! Document outline: functions, top-level locals, and tables.

use tower_lsp::lsp_types::{DocumentSymbol, Range, SymbolKind};

use lualens_core::syntax::{Block, ExprKind, FuncBody, Span, StatKind};

use crate::document::DocumentState;

pub fn document_symbols(doc: &DocumentState) -> Vec<DocumentSymbol> {
    match doc.document.ast() {
        Some(block) => block_symbols(doc, block),
        None => vec![],
    }
}

fn block_symbols(doc: &DocumentState, block: &Block) -> Vec<DocumentSymbol> {
    let mut symbols = Vec::new();
    for stat in &block.stats {
        match &stat.kind {
            StatKind::Local { names, exprs } => {
                for (index, name) in names.iter().enumerate() {
                    let kind = match exprs.get(index).map(|e| &e.kind) {
                        Some(ExprKind::Function(_)) => SymbolKind::FUNCTION,
                        Some(ExprKind::Table(_)) => SymbolKind::OBJECT,
                        _ => SymbolKind::VARIABLE,
                    };
                    let children = match exprs.get(index).map(|e| &e.kind) {
                        Some(ExprKind::Function(body)) => function_children(doc, body),
                        _ => vec![],
                    };
                    symbols.push(make_symbol(doc, name.name.clone(), kind, stat.span, name.span, children));
                }
            }
            StatKind::Assign { targets, exprs } => {
                for (index, target) in targets.iter().enumerate() {
                    if let ExprKind::Ident(name) = &target.kind {
                        let kind = match exprs.get(index).map(|e| &e.kind) {
                            Some(ExprKind::Function(_)) => SymbolKind::FUNCTION,
                            Some(ExprKind::Table(_)) => SymbolKind::OBJECT,
                            _ => SymbolKind::VARIABLE,
                        };
                        symbols.push(make_symbol(
                            doc,
                            name.clone(),
                            kind,
                            stat.span,
                            target.span,
                            vec![],
                        ));
                    }
                }
            }
            StatKind::Function {
                path,
                is_method,
                body,
            } => {
                let mut label = String::new();
                for (index, segment) in path.iter().enumerate() {
                    if index > 0 {
                        let separator = if *is_method && index == path.len() - 1 {
                            ':'
                        } else {
                            '.'
                        };
                        label.push(separator);
                    }
                    label.push_str(&segment.name);
                }
                let selection = path.last().map(|n| n.span).unwrap_or(stat.span);
                let kind = if *is_method {
                    SymbolKind::METHOD
                } else {
                    SymbolKind::FUNCTION
                };
                symbols.push(make_symbol(
                    doc,
                    label,
                    kind,
                    stat.span,
                    selection,
                    function_children(doc, body),
                ));
            }
            StatKind::LocalFunction { name, body } => {
                symbols.push(make_symbol(
                    doc,
                    name.name.clone(),
                    SymbolKind::FUNCTION,
                    stat.span,
                    name.span,
                    function_children(doc, body),
                ));
            }
            StatKind::Do(body) => {
                symbols.extend(block_symbols(doc, body));
            }
            _ => {}
        }
    }
    symbols
}

fn function_children(doc: &DocumentState, body: &FuncBody) -> Vec<DocumentSymbol> {
    body.params
        .iter()
        .map(|param| {
            make_symbol(
                doc,
                param.name.clone(),
                SymbolKind::VARIABLE,
                param.span,
                param.span,
                vec![],
            )
        })
        .collect()
}

#[allow(deprecated)]
fn make_symbol(
    doc: &DocumentState,
    name: String,
    kind: SymbolKind,
    full: Span,
    selection: Span,
    children: Vec<DocumentSymbol>,
) -> DocumentSymbol {
    let range = safe_range(doc, full, selection);
    DocumentSymbol {
        name,
        detail: None,
        kind,
        tags: None,
        deprecated: None,
        range,
        selection_range: doc.lsp_range(selection),
        children: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    }
}

/// The full range must contain the selection range; fall back to the
/// selection when spans are degenerate (recovered trees).
fn safe_range(doc: &DocumentState, full: Span, selection: Span) -> Range {
    if full.start <= selection.start && full.end >= selection.end && !full.is_empty() {
        doc.lsp_range(full)
    } else {
        doc.lsp_range(selection)
    }
}
