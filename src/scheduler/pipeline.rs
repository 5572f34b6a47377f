//! The parse pipeline shared by debounced and immediate parses.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::json;

use crate::diagnostic::{Diagnostic, Issue, SourcePosition};
use crate::document::{Context, Document, DocumentKind};
use crate::engine::{MetadataExtractor, ParseEngine, ParseOutcome};
use crate::telemetry::Telemetry;

/// Telemetry event name for unexpected parse failures.
pub const PARSE_FAILURE_EVENT: &str = "parse_failure";

/// Results of one parse attempt, ready to be stored in a `Context`.
pub(crate) struct ParseResult<T, M> {
    pub(crate) tree: Option<Arc<T>>,
    pub(crate) metadata: Option<Arc<M>>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<T, M> ParseResult<T, M> {
    /// Store the results, marking them as parsed at the document's version.
    pub(crate) fn apply(self, context: &mut Context<T, M>) {
        context.tree = self.tree;
        context.metadata = self.metadata;
        context.diagnostics = self.diagnostics;
        context.parsed_version = Some(context.document.version);
    }
}

pub(crate) struct Pipeline<E, X> {
    engine: E,
    extractor: X,
    telemetry: Arc<dyn Telemetry>,
}

impl<E, X> Pipeline<E, X>
where
    E: ParseEngine,
    X: MetadataExtractor<E::Tree>,
{
    pub(crate) fn new(engine: E, extractor: X, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            engine,
            extractor,
            telemetry,
        }
    }

    /// Parse a document. Never fails: every failure becomes a diagnostic.
    pub(crate) fn run(
        &self,
        document: &Document,
        kind: DocumentKind,
    ) -> ParseResult<E::Tree, X::Metadata> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.engine
                .parse(&document.text, &document.path, kind.is_template())
        }))
        .unwrap_or_else(|payload| ParseOutcome::InternalFailure {
            detail: format!("parser panicked: {}", panic_message(payload.as_ref())),
        });

        match outcome {
            ParseOutcome::Parsed { tree, issues } => {
                let mut diagnostics = self.attach(document, issues);
                match catch_unwind(AssertUnwindSafe(|| self.extractor.build(&tree))) {
                    Ok(metadata) => ParseResult {
                        tree: Some(Arc::new(tree)),
                        metadata: Some(Arc::new(metadata)),
                        diagnostics,
                    },
                    Err(payload) => {
                        let detail = format!(
                            "metadata extraction panicked: {}",
                            panic_message(payload.as_ref())
                        );
                        diagnostics.push(self.internal_failure(document, &detail));
                        ParseResult {
                            tree: None,
                            metadata: None,
                            diagnostics,
                        }
                    }
                }
            }
            ParseOutcome::SyntaxError {
                line,
                column,
                message,
            } => ParseResult {
                tree: None,
                metadata: None,
                diagnostics: self.attach(
                    document,
                    vec![Issue::error(SourcePosition::new(line, column), message)],
                ),
            },
            ParseOutcome::InternalFailure { detail } => ParseResult {
                tree: None,
                metadata: None,
                diagnostics: vec![self.internal_failure(document, &detail)],
            },
        }
    }

    fn attach(&self, document: &Document, issues: Vec<Issue>) -> Vec<Diagnostic> {
        issues
            .into_iter()
            .map(|issue| {
                Diagnostic::from_issue(&document.uri, &document.path, self.engine.name(), issue)
            })
            .collect()
    }

    /// Log and report an unexpected failure, and turn it into a diagnostic
    /// at the start of the document.
    fn internal_failure(&self, document: &Document, detail: &str) -> Diagnostic {
        tracing::warn!(
            uri = %document.uri,
            version = document.version,
            detail,
            "unexpected failure while parsing document"
        );
        self.telemetry.report(
            PARSE_FAILURE_EVENT,
            json!({
                "uri": document.uri.as_str(),
                "file": document.path.display().to_string(),
                "version": document.version,
                "detail": detail,
            }),
        );

        Diagnostic::from_issue(
            &document.uri,
            &document.path,
            self.engine.name(),
            Issue::error(
                SourcePosition::START,
                format!("internal error while parsing: {}", detail),
            ),
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
