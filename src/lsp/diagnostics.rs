//! Publishing scheduler diagnostics to an LSP client.

use std::collections::{BTreeMap, HashSet};

use tokio::sync::mpsc;
use tower_lsp::lsp_types::{self, DiagnosticSeverity, NumberOrString, Position, Range, Url};
use tower_lsp::Client;

use crate::diagnostic::{Diagnostic, DiagnosticsSink, Severity, SourcePosition};

/// Convert a 1-based source position to a 0-based LSP position.
pub fn to_lsp_position(position: SourcePosition) -> Position {
    Position::new(
        position.line.saturating_sub(1),
        position.column.saturating_sub(1),
    )
}

fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

/// Convert a diagnostic to its LSP form.
///
/// Diagnostics without an end position get an empty range at their start.
pub fn to_lsp_diagnostic(diagnostic: &Diagnostic) -> lsp_types::Diagnostic {
    let start = to_lsp_position(diagnostic.start);
    let end = diagnostic.end.map(to_lsp_position).unwrap_or(start);

    lsp_types::Diagnostic {
        range: Range::new(start, end),
        severity: Some(to_lsp_severity(diagnostic.severity)),
        code: diagnostic.code.clone().map(NumberOrString::String),
        code_description: None,
        source: Some(diagnostic.source.clone()),
        message: diagnostic.message.clone(),
        related_information: None,
        tags: None,
        data: None,
    }
}

/// Split a flattened diagnostics list into per-document publications.
///
/// Documents that had diagnostics in the previous round but none now get an
/// empty publication so the client clears them. Returns the publications and
/// the set of documents to remember for the next round.
pub fn plan_publications(
    previous: &HashSet<Url>,
    diagnostics: &[Diagnostic],
) -> (Vec<(Url, Vec<lsp_types::Diagnostic>)>, HashSet<Url>) {
    let mut grouped: BTreeMap<Url, Vec<lsp_types::Diagnostic>> = BTreeMap::new();
    for diagnostic in diagnostics {
        grouped
            .entry(diagnostic.uri.clone())
            .or_default()
            .push(to_lsp_diagnostic(diagnostic));
    }

    let current: HashSet<Url> = grouped.keys().cloned().collect();
    for stale in previous.difference(&current) {
        grouped.insert(stale.clone(), Vec::new());
    }

    (grouped.into_iter().collect(), current)
}

/// Sink that publishes through a tower-lsp `Client`.
///
/// Publications go through a single forwarding task so the client sees them
/// in the order the scheduler produced them.
#[derive(Debug, Clone)]
pub struct ClientSink {
    rounds: mpsc::UnboundedSender<Vec<Diagnostic>>,
}

impl ClientSink {
    /// Start the forwarding task on the current runtime.
    pub fn spawn(client: Client) -> Self {
        let (rounds, receiver) = mpsc::unbounded_channel();
        tokio::spawn(forward(client, receiver));
        Self { rounds }
    }
}

impl DiagnosticsSink for ClientSink {
    fn publish(&self, diagnostics: Vec<Diagnostic>) {
        if self.rounds.send(diagnostics).is_err() {
            tracing::warn!("diagnostics forwarder has stopped; dropping publication");
        }
    }
}

async fn forward(client: Client, mut rounds: mpsc::UnboundedReceiver<Vec<Diagnostic>>) {
    let mut published = HashSet::new();
    while let Some(diagnostics) = rounds.recv().await {
        let (publications, current) = plan_publications(&published, &diagnostics);
        for (uri, diagnostics) in publications {
            client.publish_diagnostics(uri, diagnostics, None).await;
        }
        published = current;
    }
}
