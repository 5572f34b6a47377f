//! Debounced parse scheduling and result caching for a CEL language server.
//!
//! The [`scheduler`] keeps one cached parse [`Context`] per open document and
//! reparses only after edits go quiet. The [`Backend`] wires it to tower-lsp
//! with the bundled CEL front-end.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

pub mod diagnostic;
pub mod document;
pub mod engine;
pub mod lsp;
pub mod scheduler;
pub mod settings;
pub mod telemetry;

pub use diagnostic::{Diagnostic, DiagnosticsSink, Issue, Severity, SourcePosition};
pub use document::{Context, Document, DocumentKind, DocumentStore, SupportedExtensions};
pub use engine::{MetadataExtractor, ParseEngine, ParseOutcome};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerHandle};

use engine::{CelEngine, CelTree, SymbolExtractor, SymbolTable};

/// Scheduler specialized to the CEL front-end.
pub type CelScheduler = SchedulerHandle<CelTree, SymbolTable>;

/// Cached parse state of a CEL document.
pub type CelContext = Context<CelTree, SymbolTable>;

pub struct Backend {
    client: Client,
    /// Latest snapshot of every open document, as received from the client.
    documents: DashMap<Url, Document>,
    scheduler: OnceLock<CelScheduler>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: DashMap::new(),
            scheduler: OnceLock::new(),
        }
    }

    fn scheduler(&self) -> Option<&CelScheduler> {
        let scheduler = self.scheduler.get();
        if scheduler.is_none() {
            tracing::warn!("document event before initialize; ignoring");
        }
        scheduler
    }

    fn start_scheduler(&self, workspace_root: Option<PathBuf>) {
        let settings = match &workspace_root {
            Some(root) => {
                let (settings, settings_dir) = settings::discover_settings(root);
                tracing::info!(dir = %settings_dir.display(), "using settings");
                settings
            }
            None => settings::Settings::default(),
        };

        let config = settings.scheduler_config();
        let engine = CelEngine::new(Arc::new(settings::build_env(&settings)));
        let handle = scheduler::spawn(
            config,
            engine,
            SymbolExtractor,
            Arc::new(lsp::ClientSink::spawn(self.client.clone())),
            Arc::new(lsp::ClientTelemetry::new(self.client.clone())),
        );
        if self.scheduler.set(handle).is_err() {
            tracing::warn!("initialize received twice; keeping the first scheduler");
        }
    }

    /// Store the latest snapshot and hand it to the scheduler.
    fn on_document_change(&self, uri: Url, text: String, version: i32) {
        let document = Document::new(uri.clone(), text, version);
        self.documents.insert(uri, document.clone());
        if let Some(scheduler) = self.scheduler() {
            if let Err(e) = scheduler.edit(document) {
                tracing::warn!("failed to schedule parse: {}", e);
            }
        }
    }

    /// Parse the latest snapshot of `uri` now (or reuse the cache).
    async fn fresh_context(&self, uri: &Url) -> Option<CelContext> {
        let document = self.documents.get(uri).map(|entry| entry.value().clone())?;
        let scheduler = self.scheduler()?;
        match scheduler.parse_now(document).await {
            Ok(context) => Some(context),
            Err(e) => {
                tracing::warn!(%uri, "immediate parse failed: {}", e);
                None
            }
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        self.start_scheduler(workspace_root);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(false),
                        })),
                        ..Default::default()
                    },
                )),
                document_symbol_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "CEL parse scheduler initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.on_document_change(
            params.text_document.uri,
            params.text_document.text,
            params.text_document.version,
        );
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            self.on_document_change(
                params.text_document.uri,
                change.text,
                params.text_document.version,
            );
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.fresh_context(&params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.remove(&uri);
        if let Some(scheduler) = self.scheduler() {
            if let Err(e) = scheduler.close(uri) {
                tracing::warn!("failed to close document: {}", e);
            }
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(context) = self.fresh_context(&params.text_document.uri).await else {
            return Ok(None);
        };

        Ok(symbols_for(&context).map(DocumentSymbolResponse::Nested))
    }
}

/// Document symbols, only when the stored text is the text that was parsed;
/// symbol spans index into the parsed text.
fn symbols_for(context: &CelContext) -> Option<Vec<DocumentSymbol>> {
    if !context.is_fresh() {
        return None;
    }
    let metadata = context.metadata.as_ref()?;
    Some(lsp::document_symbols(metadata, &context.document.text))
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_can_be_created() {
        let (_service, _socket) = create_service();
    }

    fn parsed_context(text: &str, version: i32) -> CelContext {
        let uri = Url::parse("doc://rule.cel").unwrap();
        let ParseOutcome::Parsed { tree, .. } =
            CelEngine::standard().parse(text, std::path::Path::new("nofile.cel"), false)
        else {
            panic!("expected a tree");
        };
        let mut context = Context::new(Document::new(uri, text, version));
        context.metadata = Some(Arc::new(SymbolExtractor.build(&tree)));
        context.tree = Some(Arc::new(tree));
        context.parsed_version = Some(version);
        context
    }

    #[test]
    fn symbols_use_the_parsed_text() {
        let context = parsed_context("x + y", 1);
        let symbols = symbols_for(&context).unwrap();
        let y = symbols.iter().find(|s| s.name == "y").unwrap();
        assert_eq!(y.range.start, Position::new(0, 4));
    }

    #[test]
    fn no_symbols_when_text_moved_past_the_parse() {
        let mut context = parsed_context("x + y", 1);
        context.update_document(Document::new(
            Url::parse("doc://rule.cel").unwrap(),
            "longer_name + x + y",
            2,
        ));
        assert!(symbols_for(&context).is_none());
    }
}
