//! Language front-end seams and the bundled CEL front-end.
//!
//! The scheduler only knows the two traits defined here. `CelEngine` and
//! `SymbolExtractor` are the implementations the language server uses.

mod cel;
mod symbols;
mod template;

use std::path::Path;

use crate::diagnostic::Issue;

pub use cel::{CelEngine, CelRoot, CelTree};
pub use symbols::{Symbol, SymbolExtractor, SymbolKind, SymbolTable};
pub use template::{extract_regions, OffsetMapper, TemplateError, TemplateRegion};

/// Result of a single parse attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    /// A tree was produced, possibly alongside non-fatal issues.
    Parsed { tree: T, issues: Vec<Issue> },
    /// The text is malformed. Line and column are 1-based.
    SyntaxError {
        line: u32,
        column: u32,
        message: String,
    },
    /// The engine failed for a reason unrelated to the text's syntax.
    InternalFailure { detail: String },
}

/// Converts text into a syntax tree.
pub trait ParseEngine: Send + 'static {
    type Tree: Send + Sync + 'static;

    /// Name stamped on diagnostics as their source.
    fn name(&self) -> &str;

    fn parse(&self, text: &str, path: &Path, is_template: bool) -> ParseOutcome<Self::Tree>;
}

/// Derives symbol metadata from a syntax tree.
pub trait MetadataExtractor<T>: Send + 'static {
    type Metadata: Send + Sync + 'static;

    fn build(&self, tree: &T) -> Self::Metadata;
}
