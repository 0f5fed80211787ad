//! End-to-end analysis scenarios over the public API.

use lualens_core::analyzer::{analyze, AnalyzerOptions};
use lualens_core::diagnostics::{codes, Severity};
use lualens_core::document::{Document, Position};
use lualens_core::layers::merge_previous_outputs;
use lualens_core::returns::extract_return_data_type;
use lualens_core::symbols::SymbolKind;
use lualens_core::types::Ty;

fn doc(source: &str) -> Document {
    Document::new("file:///hook.lua", source)
}

#[test]
fn simple_script_yields_symbol_and_return() {
    let document = doc("local x = 1\nreturn x");
    let analysis = analyze(&document, &AnalyzerOptions::default());

    let x = analysis
        .symbols
        .symbols()
        .iter()
        .find(|s| s.name == "x")
        .expect("symbol x");
    assert_eq!(x.kind, SymbolKind::Local);
    assert_eq!(x.ty.widen(), Ty::Number);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    assert_eq!(analysis.returns.len(), 1);
    assert_eq!(analysis.returns[0].ty.widen(), Ty::Number);
}

#[test]
fn return_data_shape_is_extracted() {
    let ty = extract_return_data_type("return { allowed = true, data = { userId = \"u1\" } }");
    let Ty::Table(data) = ty else {
        panic!("expected a table shape for data, got {ty:?}");
    };
    assert_eq!(data.fields.len(), 1);
    assert_eq!(data.fields[0].name, "userId");
    assert_eq!(data.fields[0].ty.widen(), Ty::String);
}

#[test]
fn parallel_layer_merge() {
    let merged = merge_previous_outputs(&[
        "return { data = { a = 1 } }".to_string(),
        "return { data = { a = \"x\", b = true } }".to_string(),
    ]);
    let Ty::Table(data) = &merged.field("data").expect("data field").ty else {
        panic!("expected a data table");
    };
    let a = data.field("a").expect("field a");
    assert_eq!(a.ty, Ty::Any);
    assert!(a.optional);
    let b = data.field("b").expect("field b");
    assert_eq!(b.ty, Ty::Boolean);
    assert!(b.optional);
}

#[test]
fn disabled_global_diagnostic_carries_registry_message() {
    let document = doc("local f = io.open(\"/etc/passwd\")\nreturn f");
    let analysis = analyze(&document, &AnalyzerOptions::default());
    let disabled: Vec<_> = analysis
        .diagnostics
        .iter()
        .filter(|d| d.code == codes::DISABLED_GLOBAL)
        .collect();
    assert_eq!(disabled.len(), 1, "exactly one diagnostic for io");
    assert!(disabled[0].message.contains("io"));
}

#[test]
fn truthy_branch_with_return_keeps_following_code_reachable() {
    let document = doc("local x = true\nif x then return end\nprint(x)\nreturn 0");
    let analysis = analyze(&document, &AnalyzerOptions::default());
    assert!(
        !analysis
            .diagnostics
            .iter()
            .any(|d| d.code == codes::UNDEFINED_VARIABLE),
        "{:?}",
        analysis.diagnostics
    );
    let source = document.text();
    let print_x = source.rfind("x)").expect("x in print call");
    assert_eq!(
        analysis.type_at(print_x).map(|t| t.widen()),
        Some(Ty::Boolean)
    );
}

#[test]
fn assert_narrows_nilable_context_field() {
    let source = "local u = context.user\nassert(u)\nlocal n = u.name\nreturn n";
    let document = doc(source);
    let analysis = analyze(
        &document,
        &AnalyzerOptions {
            hook_name: Some("before_login".to_string()),
            ..AnalyzerOptions::default()
        },
    );
    let narrowed_use = source.rfind("u.name").expect("u.name use");
    assert_eq!(
        analysis.type_at(narrowed_use),
        Some(&Ty::Ref("User".to_string())),
        "after assert, u should be the non-nil variant"
    );
}

#[test]
fn recovery_matches_hand_deleted_line() {
    let broken = doc("local a = 1\nlocal = oops\nreturn a");
    let blanked = doc("local a = 1\n            \nreturn a");
    let broken_analysis = analyze(&broken, &AnalyzerOptions::default());
    let blanked_analysis = analyze(&blanked, &AnalyzerOptions::default());

    let names = |analysis: &lualens_core::Analysis| {
        analysis
            .symbols
            .symbols()
            .iter()
            .map(|s| (s.name.clone(), s.offset))
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&broken_analysis), names(&blanked_analysis));

    let non_syntax = |analysis: &lualens_core::Analysis| {
        analysis
            .diagnostics
            .iter()
            .filter(|d| d.code != codes::SYNTAX_ERROR)
            .cloned()
            .collect::<Vec<_>>()
    };
    assert_eq!(non_syntax(&broken_analysis), non_syntax(&blanked_analysis));
    assert!(broken_analysis
        .diagnostics
        .iter()
        .any(|d| d.code == codes::SYNTAX_ERROR));
}

#[test]
fn position_offset_roundtrip_property() {
    let document = doc("local café = { a = 1 }\nreturn café.a\n");
    for offset in 0..=document.text().len() {
        if !document.text().is_char_boundary(offset) {
            continue;
        }
        let position = document.offset_to_position(offset);
        assert_eq!(document.position_to_offset(position), offset);
    }
    // And the inverse for every valid position.
    for line in 0..document.line_count() as u32 {
        let length = document.line(line as usize).unwrap_or("").len() as u32;
        for character in 0..=length {
            let position = Position::new(line, character);
            let offset = document.position_to_offset(position);
            let back = document.offset_to_position(offset);
            assert_eq!(document.position_to_offset(back), offset);
        }
    }
}

#[test]
fn scope_visibility_property() {
    let source = "local a = 1\nlocal function f(p)\n  local b = p\n  return b\nend\nreturn f(a)";
    let document = doc(source);
    let analysis = analyze(&document, &AnalyzerOptions::default());

    let b_decl = source.find("local b").unwrap() + "local ".len();
    let b = analysis
        .symbols
        .symbols()
        .iter()
        .find(|s| s.name == "b")
        .expect("symbol b");
    assert_eq!(b.offset, b_decl);

    // Visible after its declaration inside the function.
    let use_site = source.find("return b").unwrap() + "return ".len();
    let resolved = analysis.symbols.lookup("b", Some(use_site)).expect("b visible");
    assert_eq!(resolved.id, b.id);
    // Invisible before the declaration and outside the function.
    assert!(analysis.symbols.lookup("b", Some(0)).is_none());
    let top_level = source.rfind("return f").unwrap();
    assert!(analysis.symbols.lookup("b", Some(top_level)).is_none());
}

#[test]
fn success_reflects_error_severity_only() {
    let warn_only = analyze(&doc("local unused = 1\nreturn 0"), &AnalyzerOptions::default());
    assert!(
        warn_only
            .diagnostics
            .iter()
            .all(|d| d.severity != Severity::Error),
        "{:?}",
        warn_only.diagnostics
    );
    assert!(warn_only.success);

    let with_error = analyze(&doc("return nonexistent"), &AnalyzerOptions::default());
    assert!(!with_error.success);
}

#[test]
fn analysis_is_rebuilt_per_document() {
    let first = analyze(&doc("local x = 1\nreturn x"), &AnalyzerOptions::default());
    let second = analyze(&doc("local y = \"s\"\nreturn y"), &AnalyzerOptions::default());
    assert!(first.symbols.symbols().iter().any(|s| s.name == "x"));
    assert!(second.symbols.symbols().iter().all(|s| s.name != "x"));
}
