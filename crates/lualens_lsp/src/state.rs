//! Global server state, shared across all requests.

use std::sync::RwLock;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use lualens_core::analyzer::AnalyzerOptions;

use crate::document::DocumentState;

/// Uses `DashMap` for concurrent access without external locking; the
/// analyzer options come from the client's initialization options and
/// apply to every document.
pub struct ServerState {
    pub documents: DashMap<Url, DocumentState>,
    pub options: RwLock<AnalyzerOptions>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    pub fn new() -> Self {
        ServerState {
            documents: DashMap::new(),
            options: RwLock::new(AnalyzerOptions::default()),
        }
    }

    pub fn set_options(&self, options: AnalyzerOptions) {
        if let Ok(mut slot) = self.options.write() {
            *slot = options;
        }
    }

    fn current_options(&self) -> AnalyzerOptions {
        self.options
            .read()
            .map(|o| o.clone())
            .unwrap_or_default()
    }

    pub fn open_document(&self, uri: Url, source: String, version: i32) {
        let options = self.current_options();
        let doc = DocumentState::new(uri.as_str(), source, version, options);
        self.documents.insert(uri, doc);
    }

    pub fn update_document(&self, uri: &Url, source: String, version: i32) {
        if let Some(mut doc) = self.documents.get_mut(uri) {
            doc.update(source, version);
        }
    }

    pub fn close_document(&self, uri: &Url) {
        self.documents.remove(uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_uri() -> Url {
        Url::parse("file:///hook.lua").unwrap()
    }

    #[test]
    fn open_update_close_lifecycle() {
        let state = ServerState::new();
        let uri = test_uri();
        state.open_document(uri.clone(), "local x = 1\nreturn x".to_string(), 1);
        assert!(state.documents.contains_key(&uri));

        state.update_document(&uri, "return 2".to_string(), 2);
        assert_eq!(state.documents.get(&uri).unwrap().version(), 2);

        state.close_document(&uri);
        assert!(!state.documents.contains_key(&uri));
    }

    #[test]
    fn options_apply_to_new_documents() {
        let state = ServerState::new();
        state.set_options(AnalyzerOptions {
            hook_name: Some("before_login".to_string()),
            ..AnalyzerOptions::default()
        });
        let uri = test_uri();
        state.open_document(uri.clone(), "return context.user".to_string(), 1);
        let doc = state.documents.get(&uri).unwrap();
        assert_eq!(doc.options.hook_name.as_deref(), Some("before_login"));
    }
}
