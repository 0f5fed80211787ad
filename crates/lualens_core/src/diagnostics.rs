//! Diagnostics produced by the analyzer.

use crate::syntax::Span;

/// Stable diagnostic codes. Grouped by concern: syntax, semantic,
/// style, sandbox.
pub mod codes {
    // Syntax
    pub const SYNTAX_ERROR: &str = "syntax-error";

    // Semantic
    pub const UNDEFINED_VARIABLE: &str = "undefined-variable";
    pub const SCRIPT_TOO_LARGE: &str = "script-too-large";

    // Style
    pub const UNUSED_VARIABLE: &str = "unused-variable";
    pub const UNUSED_PARAMETER: &str = "unused-parameter";
    pub const SHADOWED_VARIABLE: &str = "shadowed-variable";
    pub const DEEPLY_NESTED_LOOP: &str = "deeply-nested-loop";

    // Sandbox
    pub const DISABLED_GLOBAL: &str = "disabled-global";
    pub const ASYNC_WITHOUT_AWAIT: &str = "async-without-await";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticTag {
    Unused,
    Deprecated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    pub tags: Vec<DiagnosticTag>,
    /// A second location the diagnostic refers to (e.g. the shadowed
    /// declaration).
    pub related_span: Option<Span>,
}

impl Diagnostic {
    pub fn error(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            span,
            message: message.into(),
            tags: Vec::new(),
            related_span: None,
        }
    }

    pub fn warning(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Warning,
            span,
            message: message.into(),
            tags: Vec::new(),
            related_span: None,
        }
    }

    pub fn with_tag(mut self, tag: DiagnosticTag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_related(mut self, span: Span) -> Self {
        self.related_span = Some(span);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_fields() {
        let d = Diagnostic::warning(codes::UNUSED_VARIABLE, Span::new(3, 4), "unused variable 'x'")
            .with_tag(DiagnosticTag::Unused)
            .with_related(Span::new(0, 1));
        assert_eq!(d.code, "unused-variable");
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.tags, vec![DiagnosticTag::Unused]);
        assert_eq!(d.related_span, Some(Span::new(0, 1)));
    }
}
