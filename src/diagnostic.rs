//! Compiler-style diagnostics and the sink they are published to.

use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::Url;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "info",
            Severity::Hint => "hint",
        }
    }
}

/// A 1-based line/column position. Columns count UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    /// Fallback position used when a failure carries no location.
    pub const START: SourcePosition = SourcePosition { line: 1, column: 1 };

    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A positioned issue as reported by a parse engine, before it is attached
/// to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub start: SourcePosition,
    /// End of the offending span, when the engine knows it.
    pub end: Option<SourcePosition>,
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn error(start: SourcePosition, message: impl Into<String>) -> Self {
        Self {
            start,
            end: None,
            severity: Severity::Error,
            code: None,
            message: message.into(),
        }
    }
}

/// A diagnostic attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Identity of the document the diagnostic belongs to.
    pub uri: Url,
    /// Path handed to the parse engine (may be a `nofile.<ext>` placeholder).
    pub file: PathBuf,
    /// Name of the tool that produced the diagnostic.
    pub source: String,
    pub start: SourcePosition,
    pub end: Option<SourcePosition>,
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn from_issue(uri: &Url, file: &Path, source: &str, issue: Issue) -> Self {
        Self {
            uri: uri.clone(),
            file: file.to_path_buf(),
            source: source.to_string(),
            start: issue.start,
            end: issue.end,
            severity: issue.severity,
            code: issue.code,
            message: issue.message,
        }
    }
}

/// Receives the flattened diagnostics of every tracked document.
///
/// Implementations must not block: the scheduler calls `publish` from its
/// event loop.
pub trait DiagnosticsSink: Send + Sync {
    fn publish(&self, diagnostics: Vec<Diagnostic>);
}
