//! Conversion of analyzer diagnostics to LSP diagnostics.

use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, DiagnosticTag, Location,
    NumberOrString, Url,
};

use lualens_core::diagnostics::{
    Diagnostic as CoreDiagnostic, DiagnosticTag as CoreTag, Severity as CoreSeverity,
};

use crate::document::DocumentState;

/// Convert the analyzer's diagnostics for publishing.
///
/// Pass the document `uri` to attach `DiagnosticRelatedInformation`
/// (e.g. the shadowed declaration's location); `None` omits it.
pub fn to_lsp(doc: &DocumentState, uri: Option<&Url>) -> Vec<Diagnostic> {
    doc.analysis
        .diagnostics
        .iter()
        .map(|d| convert(doc, d, uri))
        .collect()
}

fn convert(doc: &DocumentState, diagnostic: &CoreDiagnostic, uri: Option<&Url>) -> Diagnostic {
    let related_information = match (uri, diagnostic.related_span) {
        (Some(uri), Some(span)) => Some(vec![DiagnosticRelatedInformation {
            location: Location {
                uri: uri.clone(),
                range: doc.lsp_range(span),
            },
            message: "first declared here".to_string(),
        }]),
        _ => None,
    };

    let tags: Vec<DiagnosticTag> = diagnostic
        .tags
        .iter()
        .map(|tag| match tag {
            CoreTag::Unused => DiagnosticTag::UNNECESSARY,
            CoreTag::Deprecated => DiagnosticTag::DEPRECATED,
        })
        .collect();

    Diagnostic {
        range: doc.lsp_range(diagnostic.span),
        severity: Some(severity(diagnostic.severity)),
        code: Some(NumberOrString::String(diagnostic.code.to_string())),
        source: Some("lualens".to_string()),
        message: diagnostic.message.clone(),
        tags: if tags.is_empty() { None } else { Some(tags) },
        related_information,
        ..Default::default()
    }
}

fn severity(severity: CoreSeverity) -> DiagnosticSeverity {
    match severity {
        CoreSeverity::Error => DiagnosticSeverity::ERROR,
        CoreSeverity::Warning => DiagnosticSeverity::WARNING,
        CoreSeverity::Info => DiagnosticSeverity::INFORMATION,
        CoreSeverity::Hint => DiagnosticSeverity::HINT,
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

    #[test]
    fn clean_source_has_no_diagnostics() {
        let doc = make_doc("local x = 1\nreturn x");
        assert!(to_lsp(&doc, None).is_empty());
    }

    #[test]
    fn undefined_variable_is_error_with_code() {
        let doc = make_doc("return mystery");
        let diags = to_lsp(&doc, None);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            diags[0].code,
            Some(NumberOrString::String("undefined-variable".to_string()))
        );
        assert_eq!(diags[0].source.as_deref(), Some("lualens"));
    }

    #[test]
    fn unused_variable_gets_unnecessary_tag() {
        let doc = make_doc("local dead = 1\nreturn 0");
        let diags = to_lsp(&doc, None);
        let unused = diags
            .iter()
            .find(|d| {
                d.code == Some(NumberOrString::String("unused-variable".to_string()))
            })
            .expect("unused diagnostic");
        assert_eq!(unused.tags.as_deref(), Some(&[DiagnosticTag::UNNECESSARY][..]));
    }

    #[test]
    fn shadowing_carries_related_information() {
        let uri = Url::parse("file:///hook.lua").unwrap();
        let doc = make_doc(
            "local x = 1\nlocal function f()\n  local x = 2\n  return x\nend\nreturn f() + x",
        );
        let diags = to_lsp(&doc, Some(&uri));
        let shadow = diags
            .iter()
            .find(|d| d.code == Some(NumberOrString::String("shadowed-variable".to_string())))
            .expect("shadowing diagnostic");
        let related = shadow.related_information.as_ref().expect("related info");
        assert_eq!(related[0].location.uri, uri);
        assert_eq!(related[0].location.range.start.line, 0);
    }

    #[test]
    fn diagnostic_ranges_point_at_source() {
        let source = "return mystery";
        let doc = make_doc(source);
        let diags = to_lsp(&doc, None);
        let range = diags[0].range;
        assert_eq!(range.start.line, 0);
        assert_eq!(range.start.character, 7);
        assert_eq!(range.end.character, 14);
    }
}
