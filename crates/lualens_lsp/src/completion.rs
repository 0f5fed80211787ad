//! Context-aware completion.
//!
//! The trigger is classified from the text before the cursor: after
//! `.` or `:` the base path decides member candidates (registry
//! namespaces first, then the inferred type of the base); anywhere
//! else the candidates are scope symbols, keywords, globals,
//! libraries, and sandbox items.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionResponse, Documentation, InsertTextFormat,
    MarkupContent, MarkupKind, Position,
};

use lualens_core::definitions::{Definitions, MemberDef};
use lualens_core::types::{format_ty, Ty};

use crate::document::DocumentState;

pub fn completions(doc: &DocumentState, position: Position) -> Option<CompletionResponse> {
    let offset = doc.offset_of(position);
    let mut items = match member_base_path(doc, offset) {
        Some(path) => member_items(doc, offset, &path),
        None => general_items(doc, offset),
    };
    dedupe_by_label(&mut items);
    Some(CompletionResponse::Array(items))
}

/// The dotted path before the cursor when the cursor sits in member
/// position (`helpers.|`, `context.user.|`, `ctx.na|me`).
fn member_base_path(doc: &DocumentState, offset: usize) -> Option<Vec<String>> {
    let text = doc.document.text();
    let bytes = text.as_bytes();
    let is_word = |b: u8| b == b'_' || b.is_ascii_alphanumeric();

    // Skip back over the partial word being typed.
    let mut cursor = offset.min(bytes.len());
    while cursor > 0 && is_word(bytes[cursor - 1]) {
        cursor -= 1;
    }
    if cursor == 0 || (bytes[cursor - 1] != b'.' && bytes[cursor - 1] != b':') {
        return None;
    }

    let mut path = Vec::new();
    while cursor > 0 && (bytes[cursor - 1] == b'.' || bytes[cursor - 1] == b':') {
        let end = cursor - 1;
        let mut start = end;
        while start > 0 && is_word(bytes[start - 1]) {
            start -= 1;
        }
        if start == end || bytes[start].is_ascii_digit() {
            return None;
        }
        path.push(text[start..end].to_string());
        cursor = start;
    }
    path.reverse();
    Some(path)
}

fn member_items(doc: &DocumentState, offset: usize, path: &[String]) -> Vec<CompletionItem> {
    let defs = Definitions::global();
    let hook = doc.options.hook_name.as_deref();
    let path_refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();

    let registry = defs.member_completions(&path_refs, hook);
    if !registry.is_empty() {
        return registry
            .into_iter()
            .map(|(name, def)| member_item(name, def))
            .collect();
    }

    // Fall back to the inferred type of the base expression.
    if let Some(first) = path.first() {
        if let Some(symbol) = doc.analysis.symbols.lookup(first, Some(offset)) {
            let mut ty = symbol.ty.without_nil();
            for segment in &path[1..] {
                ty = member_type(defs, &ty, segment);
            }
            return type_member_items(defs, &ty);
        }
    }
    vec![]
}

fn member_type(defs: &Definitions, base: &Ty, name: &str) -> Ty {
    match base {
        Ty::Table(table) => table
            .field(name)
            .map(|f| f.ty.clone())
            .unwrap_or(Ty::Unknown),
        Ty::Ref(type_name) => defs
            .type_fields(type_name)
            .and_then(|fields| fields.get(name))
            .map(|def| defs.member_ty(def))
            .unwrap_or(Ty::Unknown),
        Ty::Union(members) => members
            .iter()
            .filter(|m| !matches!(m, Ty::Nil))
            .map(|m| member_type(defs, m, name))
            .find(|t| *t != Ty::Unknown)
            .unwrap_or(Ty::Unknown),
        _ => Ty::Unknown,
    }
}

fn type_member_items(defs: &Definitions, ty: &Ty) -> Vec<CompletionItem> {
    match ty {
        Ty::Table(table) => table
            .fields
            .iter()
            .map(|field| {
                let kind = if matches!(field.ty, Ty::Fn(_) | Ty::Function) {
                    CompletionItemKind::FUNCTION
                } else {
                    CompletionItemKind::FIELD
                };
                CompletionItem {
                    label: field.name.clone(),
                    kind: Some(kind),
                    detail: Some(format_ty(&field.ty)),
                    documentation: field.description.clone().map(plain_doc),
                    ..Default::default()
                }
            })
            .collect(),
        Ty::Ref(type_name) => defs
            .type_fields(type_name)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, def)| member_item(name, def))
                    .collect()
            })
            .unwrap_or_default(),
        Ty::Union(members) => members
            .iter()
            .filter(|m| !matches!(m, Ty::Nil))
            .map(|m| type_member_items(defs, m))
            .find(|items| !items.is_empty())
            .unwrap_or_default(),
        Ty::String | Ty::StringLit(_) => defs
            .library("string")
            .map(|lib| {
                lib.methods
                    .iter()
                    .map(|(name, def)| {
                        let mut item = member_item(name, def);
                        item.kind = Some(CompletionItemKind::METHOD);
                        item
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => vec![],
    }
}

fn member_item(name: &String, def: &MemberDef) -> CompletionItem {
    let is_function = def.type_name.as_deref() == Some("function") || def.parameters.is_some();
    let detail = def
        .signature
        .clone()
        .or_else(|| def.type_name.clone())
        .or_else(|| Some(format_ty(&Definitions::global().member_ty(def))));
    CompletionItem {
        label: name.clone(),
        kind: Some(if is_function {
            CompletionItemKind::FUNCTION
        } else {
            CompletionItemKind::FIELD
        }),
        detail,
        documentation: def.description.clone().map(plain_doc),
        ..Default::default()
    }
}

fn general_items(doc: &DocumentState, offset: usize) -> Vec<CompletionItem> {
    let defs = Definitions::global();
    let mut items = Vec::new();

    // Symbols visible at the cursor, innermost declaration winning.
    for symbol in doc.analysis.symbols.symbols() {
        let visible = doc
            .analysis
            .symbols
            .lookup(&symbol.name, Some(offset))
            .map(|resolved| resolved.id == symbol.id)
            .unwrap_or(false);
        if !visible {
            continue;
        }
        items.push(CompletionItem {
            label: symbol.name.clone(),
            kind: Some(match symbol.ty {
                Ty::Fn(_) | Ty::Function => CompletionItemKind::FUNCTION,
                _ => CompletionItemKind::VARIABLE,
            }),
            detail: Some(format_ty(&symbol.ty)),
            ..Default::default()
        });
    }

    for name in defs.sandbox_item_names() {
        let meta = defs.sandbox_item_metadata(name);
        let kind = match meta.as_ref().map(|m| m.kind.as_str()) {
            Some("function") => CompletionItemKind::FUNCTION,
            _ => CompletionItemKind::MODULE,
        };
        let description = defs
            .sandbox_item(name)
            .and_then(|item| item.description.clone());
        items.push(CompletionItem {
            label: name.clone(),
            kind: Some(kind),
            detail: defs
                .sandbox_item(name)
                .and_then(|item| item.signature.clone()),
            documentation: description.map(plain_doc),
            ..Default::default()
        });
    }

    for name in defs.library_names() {
        items.push(CompletionItem {
            label: name.clone(),
            kind: Some(CompletionItemKind::MODULE),
            detail: defs.library(name).and_then(|lib| lib.description.clone()),
            ..Default::default()
        });
    }

    for name in defs.global_names() {
        let def = defs.global_def(name);
        let is_function = def
            .map(|d| d.parameters.is_some() || d.kind.as_deref() == Some("function"))
            .unwrap_or(false);
        items.push(CompletionItem {
            label: name.clone(),
            kind: Some(if is_function {
                CompletionItemKind::FUNCTION
            } else {
                CompletionItemKind::VALUE
            }),
            detail: def.and_then(|d| d.signature.clone()),
            documentation: def.and_then(|d| d.description.clone()).map(plain_doc),
            ..Default::default()
        });
    }

    add_keyword_items(defs, &mut items);
    items
}

fn add_keyword_items(defs: &Definitions, items: &mut Vec<CompletionItem>) {
    let snippets = [
        ("local", "local ${1:name} = ${2:value}"),
        ("if", "if ${1:condition} then\n  ${2}\nend"),
        ("for", "for ${1:i} = ${2:1}, ${3:n} do\n  ${4}\nend"),
        ("while", "while ${1:condition} do\n  ${2}\nend"),
        ("function", "function ${1:name}(${2})\n  ${3}\nend"),
        ("return", "return ${1}"),
    ];
    for keyword in defs.keywords() {
        let snippet = snippets.iter().find(|(name, _)| name == keyword);
        items.push(CompletionItem {
            label: keyword.clone(),
            kind: Some(CompletionItemKind::KEYWORD),
            insert_text: snippet.map(|(_, body)| body.to_string()),
            insert_text_format: snippet.map(|_| InsertTextFormat::SNIPPET),
            ..Default::default()
        });
    }
}

fn dedupe_by_label(items: &mut Vec<CompletionItem>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.label.clone()));
}

fn plain_doc(text: String) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value: text,
    })
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

    fn make_doc_for_hook(source: &str, hook: &str) -> DocumentState {
        DocumentState::new(
            "file:///hook.lua",
            source.to_string(),
            1,
            AnalyzerOptions {
                hook_name: Some(hook.to_string()),
                ..AnalyzerOptions::default()
            },
        )
    }

    fn labels(response: Option<CompletionResponse>) -> Vec<String> {
        match response {
            Some(CompletionResponse::Array(items)) => {
                items.into_iter().map(|i| i.label).collect()
            }
            _ => vec![],
        }
    }

    #[test]
    fn member_completion_after_helpers_dot() {
        let doc = make_doc("helpers.");
        let found = labels(completions(&doc, Position { line: 0, character: 8 }));
        assert!(found.contains(&"log".to_string()), "{found:?}");
        assert!(found.contains(&"http_request".to_string()));
        assert!(
            !found.contains(&"print".to_string()),
            "member position should not offer globals"
        );
    }

    #[test]
    fn member_completion_respects_hook_variant() {
        let doc = make_doc_for_hook("return context.", "before_login");
        let found = labels(completions(&doc, Position { line: 0, character: 15 }));
        assert!(found.contains(&"user".to_string()), "{found:?}");
        assert!(found.contains(&"request".to_string()));
        assert!(!found.contains(&"session".to_string()), "other hook's field");
    }

    #[test]
    fn member_completion_through_local_symbol() {
        let source = "local u = context.user\nreturn u.";
        let doc = make_doc_for_hook(source, "before_login");
        let found = labels(completions(&doc, Position { line: 1, character: 9 }));
        assert!(found.contains(&"email".to_string()), "{found:?}");
        assert!(found.contains(&"verified".to_string()));
    }

    #[test]
    fn member_completion_on_partial_word() {
        let doc = make_doc("helpers.lo");
        let found = labels(completions(&doc, Position { line: 0, character: 10 }));
        assert!(found.contains(&"log".to_string()), "{found:?}");
    }

    #[test]
    fn general_completion_includes_scope_and_builtins() {
        let source = "local count = 1\nreturn ";
        let doc = make_doc(source);
        let found = labels(completions(&doc, Position { line: 1, character: 7 }));
        assert!(found.contains(&"count".to_string()), "{found:?}");
        assert!(found.contains(&"helpers".to_string()));
        assert!(found.contains(&"context".to_string()));
        assert!(found.contains(&"print".to_string()));
        assert!(found.contains(&"string".to_string()));
        assert!(found.contains(&"if".to_string()), "keywords offered");
    }

    #[test]
    fn out_of_scope_symbols_are_hidden() {
        let source = "local function f()\n  local inner = 1\n  return inner\nend\nreturn ";
        let doc = make_doc(source);
        let found = labels(completions(&doc, Position { line: 4, character: 7 }));
        assert!(!found.contains(&"inner".to_string()), "{found:?}");
        assert!(found.contains(&"f".to_string()));
    }

    #[test]
    fn labels_are_deduplicated() {
        let doc = make_doc("local print = 1\nreturn ");
        let found = labels(completions(&doc, Position { line: 1, character: 7 }));
        let count = found.iter().filter(|l| l.as_str() == "print").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn string_member_completion_offers_methods() {
        let source = "local s = \"text\"\nreturn s.";
        let doc = make_doc(source);
        let found = labels(completions(&doc, Position { line: 1, character: 9 }));
        assert!(found.contains(&"upper".to_string()), "{found:?}");
    }

    #[test]
    fn keyword_snippets_have_snippet_format() {
        let doc = make_doc("return ");
        if let Some(CompletionResponse::Array(items)) =
            completions(&doc, Position { line: 0, character: 7 })
        {
            let if_item = items.iter().find(|i| i.label == "if").expect("if keyword");
            assert_eq!(if_item.insert_text_format, Some(InsertTextFormat::SNIPPET));
        }
    }

    #[test]
    fn no_crash_on_empty_document() {
        let doc = make_doc("");
        let result = completions(&doc, Position { line: 0, character: 0 });
        assert!(result.is_some());
    }
}
