//! # lualens-lsp
//!
//! Language Server Protocol front-end for the lualens analysis core.
//!
//! The server keeps one [`document::DocumentState`] per open buffer,
//! re-running the core analysis on every change (FULL text sync), and
//! answers editor requests from the latest analysis:
//!
//! | Feature | Module |
//! |---------|--------|
//! | Diagnostics | [`diagnostics`] |
//! | Completion | [`completion`] |
//! | Hover | [`hover`] |
//! | Signature help | [`signature_help`] |
//! | Go to definition | [`definition`] |
//! | Find references | [`references`] |
//! | Document symbols | [`document_symbols`] |
//!
//! Hook identity and the previous layer's script sources come from the
//! client's `initializationOptions`:
//!
//! ```json
//! {
//!   "hookName": "before_login",
//!   "previousScripts": ["return { allowed = true, data = { risk = 0 } }"]
//! }
//! ```
//!
//! Every request is served from in-memory state; the server performs
//! no I/O besides the LSP transport.

pub mod completion;
pub mod definition;
pub mod diagnostics;
pub mod document;
pub mod document_symbols;
pub mod hover;
pub mod references;
pub mod server;
pub mod signature_help;
pub mod state;
