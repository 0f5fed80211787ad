//! Hover information.
//!
//! For bare identifiers the lookup order mirrors identifier inference
//! (sandbox item, then library, then global, then local symbol), so a
//! local shadowing an injected global still documents the sandbox
//! entity. For member paths the registry is consulted first, then the
//! inferred type of the base.

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

use lualens_core::definitions::{Definitions, MemberDef};
use lualens_core::types::{format_ty, format_ty_with, FormatOptions, Ty};

use crate::document::DocumentState;

pub fn hover(doc: &DocumentState, position: Position) -> Option<Hover> {
    let (path, span) = doc.member_path_at(position)?;
    let defs = Definitions::global();

    let content = if path.len() > 1 {
        member_hover(doc, defs, &path, span.start)
    } else {
        identifier_hover(doc, defs, &path[0], span.start)
    }?;

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: content,
        }),
        range: Some(doc.lsp_range(span)),
    })
}

fn identifier_hover(
    doc: &DocumentState,
    defs: &Definitions,
    name: &str,
    offset: usize,
) -> Option<String> {
    if let Some(item) = defs.sandbox_item(name) {
        let meta = defs.sandbox_item_metadata(name)?;
        let mut text = match item.kind.as_str() {
            "namespace" => format!("**{}** (namespace{})", name, readonly_suffix(&meta)),
            "function" => format!(
                "```lua\n{}\n```",
                item.signature.clone().unwrap_or_else(|| name.to_string())
            ),
            other => format!("**{}** ({})", name, other),
        };
        if let Some(description) = &item.description {
            text.push_str("\n\n");
            text.push_str(description);
        }
        if item.kind == "namespace" {
            let hook = doc.options.hook_name.as_deref();
            if let Some(ty) = defs.sandbox_item_ty(name, hook) {
                text.push_str("\n\n```lua\n");
                text.push_str(&format_ty_with(
                    &ty,
                    &FormatOptions {
                        multiline: true,
                        max_depth: 2,
                    },
                ));
                text.push_str("\n```");
            }
        }
        return Some(text);
    }

    if let Some(lib) = defs.library(name) {
        let mut text = format!("**{}** (library)", name);
        if let Some(description) = &lib.description {
            text.push_str("\n\n");
            text.push_str(description);
        }
        return Some(text);
    }

    if let Some(def) = defs.global_def(name) {
        return Some(member_text(name, def));
    }

    if let Some(symbol) = doc.analysis.symbols.lookup(name, Some(offset)) {
        // Prefer the narrowed type cached at this use site.
        let ty = doc
            .analysis
            .type_at(offset)
            .cloned()
            .unwrap_or_else(|| symbol.ty.clone());
        let kind = match symbol.kind {
            lualens_core::symbols::SymbolKind::Parameter => "parameter",
            lualens_core::symbols::SymbolKind::LoopVariable => "loop variable",
            lualens_core::symbols::SymbolKind::Global => "global",
            lualens_core::symbols::SymbolKind::Local => "local",
        };
        return Some(format!("```lua\n{} {}: {}\n```", kind, name, format_ty(&ty)));
    }

    let ty = doc.analysis.type_at(offset)?;
    Some(format!("```lua\n{}\n```", format_ty(ty)))
}

fn member_hover(
    doc: &DocumentState,
    defs: &Definitions,
    path: &[String],
    offset: usize,
) -> Option<String> {
    let path_refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
    if let Some(def) = defs.resolve_member_path(&path_refs) {
        return Some(member_text(&path.join("."), def));
    }

    // Walk the base's inferred type instead.
    let (first, rest) = path.split_first()?;
    let symbol = doc.analysis.symbols.lookup(first, None)?;
    let mut ty = symbol.ty.without_nil();
    let mut description = None;
    for segment in rest {
        let (next, doc_text) = field_of(defs, &ty, segment);
        ty = next;
        description = doc_text;
    }
    if ty == Ty::Unknown {
        let cached = doc.analysis.type_at(offset)?;
        return Some(format!("```lua\n{}\n```", format_ty(cached)));
    }
    let mut text = format!("```lua\n{}: {}\n```", path.join("."), format_ty(&ty));
    if let Some(description) = description {
        text.push_str("\n\n");
        text.push_str(&description);
    }
    Some(text)
}

fn field_of(defs: &Definitions, base: &Ty, name: &str) -> (Ty, Option<String>) {
    match base {
        Ty::Table(table) => table
            .field(name)
            .map(|f| (f.ty.clone(), f.description.clone()))
            .unwrap_or((Ty::Unknown, None)),
        Ty::Ref(type_name) => defs
            .type_fields(type_name)
            .and_then(|fields| fields.get(name))
            .map(|def| (defs.member_ty(def), def.description.clone()))
            .unwrap_or((Ty::Unknown, None)),
        Ty::Union(members) => members
            .iter()
            .filter(|m| !matches!(m, Ty::Nil))
            .map(|m| field_of(defs, m, name))
            .find(|(t, _)| *t != Ty::Unknown)
            .unwrap_or((Ty::Unknown, None)),
        _ => (Ty::Unknown, None),
    }
}

fn member_text(label: &str, def: &MemberDef) -> String {
    let defs = Definitions::global();
    let mut text = match &def.signature {
        Some(signature) => format!("```lua\n{}\n```", signature),
        None => format!("```lua\n{}: {}\n```", label, format_ty(&defs.member_ty(def))),
    };
    if def.is_async {
        text.push_str("\n\n*async — resolve with `await(...)`*");
    }
    if let Some(description) = &def.description {
        text.push_str("\n\n");
        text.push_str(description);
    }
    text
}

fn readonly_suffix(meta: &lualens_core::definitions::SandboxItemMetadata) -> &'static str {
    if meta.is_readonly {
        ", read-only"
    } else {
        ""
    }
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

    fn hover_text(doc: &DocumentState, line: u32, character: u32) -> Option<String> {
        hover(doc, Position { line, character }).map(|h| match h.contents {
            HoverContents::Markup(m) => m.value,
            _ => String::new(),
        })
    }

    #[test]
    fn hover_on_local_shows_type() {
        let doc = make_doc("local count = 1\nreturn count");
        let text = hover_text(&doc, 1, 8).expect("hover on count");
        assert!(text.contains("local"), "{text}");
        assert!(text.contains("count"), "{text}");
    }

    #[test]
    fn hover_on_sandbox_namespace_beats_local() {
        // A local named `helpers` shadows the namespace at runtime, but
        // hover documents the injected entity.
        let doc = make_doc("local helpers = 1\nreturn helpers");
        let text = hover_text(&doc, 1, 8).expect("hover on helpers");
        assert!(text.contains("namespace"), "{text}");
    }

    #[test]
    fn hover_on_helper_member_shows_signature() {
        let doc = make_doc("helpers.log(\"hi\")");
        let text = hover_text(&doc, 0, 9).expect("hover on log");
        assert!(text.contains("helpers.log"), "{text}");
        assert!(text.contains("execution log"), "{text}");
    }

    #[test]
    fn hover_on_async_helper_mentions_await() {
        let doc = make_doc("helpers.http_request({})");
        let text = hover_text(&doc, 0, 10).expect("hover on http_request");
        assert!(text.contains("async"), "{text}");
    }

    #[test]
    fn hover_on_context_field_uses_hook_variant() {
        let doc = make_doc_for_hook("return context.user", "before_login");
        let text = hover_text(&doc, 0, 16).expect("hover on user");
        assert!(text.contains("User"), "{text}");
    }

    #[test]
    fn hover_shows_narrowed_type_after_assert() {
        let source = "local u = context.user\nassert(u)\nlocal n = u.name\nreturn n";
        let doc = make_doc_for_hook(source, "before_login");
        // Hover on `u` in `u.name` (line 2, character 10).
        let text = hover_text(&doc, 2, 10).expect("hover on u");
        assert!(text.contains("User"), "{text}");
        assert!(!text.contains("nil"), "narrowed away: {text}");
    }

    #[test]
    fn hover_on_library_method() {
        let doc = make_doc("return string.upper(\"x\")");
        let text = hover_text(&doc, 0, 15).expect("hover on upper");
        assert!(text.contains("string.upper"), "{text}");
    }

    #[test]
    fn hover_on_global_function() {
        let doc = make_doc("print(\"x\")");
        let text = hover_text(&doc, 0, 2).expect("hover on print");
        assert!(text.contains("print"), "{text}");
    }

    #[test]
    fn hover_on_member_of_local_table() {
        let doc = make_doc("local t = { flag = true }\nreturn t.flag");
        let text = hover_text(&doc, 1, 10).expect("hover on flag");
        assert!(text.contains("flag"), "{text}");
        assert!(text.contains("true") || text.contains("boolean"), "{text}");
    }

    #[test]
    fn hover_outside_any_word_returns_none() {
        let doc = make_doc("local x = 1");
        // Clamped past the end of the line, the nearest text is the
        // number literal, which is not an identifier word.
        assert!(hover(&doc, Position { line: 0, character: 20 }).is_none());
        assert!(hover(&doc, Position { line: 5, character: 0 }).is_none());
    }
}
