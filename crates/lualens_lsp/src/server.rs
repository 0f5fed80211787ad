//! The tower-lsp server wiring.

use serde::Deserialize;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use lualens_core::analyzer::AnalyzerOptions;

use crate::state::ServerState;

pub struct LuaLensServer {
    client: Client,
    state: ServerState,
}

/// Client-supplied configuration, passed as `initializationOptions`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InitOptions {
    hook_name: Option<String>,
    previous_scripts: Vec<String>,
    max_script_size: Option<usize>,
    max_loop_depth: Option<usize>,
    check_unused: Option<bool>,
    check_shadowing: Option<bool>,
}

impl LuaLensServer {
    pub fn new(client: Client) -> Self {
        LuaLensServer {
            client,
            state: ServerState::new(),
        }
    }

    async fn publish_diagnostics(&self, uri: Url) {
        let payload = self.state.documents.get(&uri).map(|doc| {
            (
                crate::diagnostics::to_lsp(&doc, Some(&uri)),
                doc.version(),
            )
        });
        if let Some((diagnostics, version)) = payload {
            self.client
                .publish_diagnostics(uri, diagnostics, Some(version))
                .await;
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for LuaLensServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(raw) = params.initialization_options {
            match serde_json::from_value::<InitOptions>(raw) {
                Ok(init) => {
                    let defaults = AnalyzerOptions::default();
                    self.state.set_options(AnalyzerOptions {
                        hook_name: init.hook_name,
                        previous_scripts: init.previous_scripts,
                        max_script_size: init.max_script_size.unwrap_or(defaults.max_script_size),
                        max_loop_depth: init.max_loop_depth.unwrap_or(defaults.max_loop_depth),
                        check_unused: init.check_unused.unwrap_or(defaults.check_unused),
                        check_shadowing: init
                            .check_shadowing
                            .unwrap_or(defaults.check_shadowing),
                    });
                }
                Err(err) => log::warn!("ignoring malformed initialization options: {err}"),
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![".".to_string(), ":".to_string()]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "lualens-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("lualens LSP initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        self.state.open_document(
            params.text_document.uri,
            params.text_document.text,
            params.text_document.version,
        );
        self.publish_diagnostics(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        // FULL sync: exactly one change carrying the whole text.
        if let Some(change) = params.content_changes.into_iter().next() {
            self.state
                .update_document(&uri, change.text, params.text_document.version);
        }
        self.publish_diagnostics(uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.state.close_document(&params.text_document.uri);
        self.client
            .publish_diagnostics(params.text_document.uri, vec![], None)
            .await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let doc = match self.state.documents.get(uri) {
            Some(doc) => doc,
            None => return Ok(None),
        };
        Ok(crate::completion::completions(&doc, position))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let doc = match self.state.documents.get(uri) {
            Some(doc) => doc,
            None => return Ok(None),
        };
        Ok(crate::hover::hover(&doc, position))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let doc = match self.state.documents.get(uri) {
            Some(doc) => doc,
            None => return Ok(None),
        };
        Ok(crate::signature_help::signature_help(&doc, position))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let doc = match self.state.documents.get(uri) {
            Some(doc) => doc,
            None => return Ok(None),
        };
        Ok(crate::definition::goto_definition(&doc, position, uri))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let doc = match self.state.documents.get(uri) {
            Some(doc) => doc,
            None => return Ok(None),
        };
        let locations = crate::references::find_references(
            &doc,
            position,
            uri,
            params.context.include_declaration,
        );
        if locations.is_empty() {
            Ok(None)
        } else {
            Ok(Some(locations))
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = &params.text_document.uri;
        let doc = match self.state.documents.get(uri) {
            Some(doc) => doc,
            None => return Ok(None),
        };
        let symbols = crate::document_symbols::document_symbols(&doc);
        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }
}
