//! # lualens-core
//!
//! Static-analysis core for sandboxed Lua hook scripts.
//!
//! Hook scripts are short Lua programs that customize an
//! authentication pipeline. They run against a fixed environment:
//! injected namespaces (`helpers`, `context`), a curated subset of the
//! standard library, and a set of globals the sandbox removes. This
//! crate gives editors per-keystroke intelligence over such scripts:
//!
//! ```text
//! Document ── parse (external grammar) ── syntax tree
//!     │                                       │
//!     └── analyze ────────────────────────────┤
//!          symbols · types · flow · diagnostics
//!                         │
//!            editor services (completion, hover, ...)
//! ```
//!
//! ## Modules
//!
//! - [`document`] - source text, line index, memoized parse with
//!   one-line recovery
//! - [`syntax`] - the analyzer's node model and the parser boundary
//! - [`types`] - the type lattice (unions, tuples, tables, literal
//!   singletons)
//! - [`definitions`] - the immutable registry of globals, libraries,
//!   sandbox items, and named record types
//! - [`symbols`] - lexical scopes and symbol resolution
//! - [`flow`] - control-flow graph and truthiness narrowing
//! - [`infer`] - per-expression type inference
//! - [`analyzer`] - the two-pass orchestrator producing an
//!   [`analyzer::Analysis`]
//! - [`returns`] - standalone return-shape extraction
//! - [`layers`] - merging prior-layer outputs into `context.prev`
//!
//! One analysis is synchronous, owns its arenas, and produces an
//! immutable result; the host re-analyzes on every text change and
//! drops stale results. Only the definition registry outlives an
//! analysis, and it is never mutated after load.

pub mod analyzer;
pub mod definitions;
pub mod diagnostics;
pub mod document;
pub mod flow;
pub mod infer;
pub mod layers;
pub mod returns;
pub mod symbols;
pub mod syntax;
pub mod types;

pub use analyzer::{analyze, Analysis, AnalyzerOptions, ReturnInfo};
pub use definitions::Definitions;
pub use diagnostics::{Diagnostic, DiagnosticTag, Severity};
pub use document::{Document, Position, Range, TextEdit};
pub use syntax::Span;
pub use types::Ty;
