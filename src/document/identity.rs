//! Document identities: path derivation and extension allow-listing.

use std::path::PathBuf;

use tower_lsp::lsp_types::Url;

/// The last dot-delimited segment of an identity string.
///
/// An identity without a dot yields the whole string.
pub fn extension(identity: &str) -> &str {
    identity.rsplit('.').next().unwrap_or(identity)
}

/// Derive the path handed to the parse engine.
///
/// Local `file:` identities map to their filesystem path. Everything else
/// gets a `nofile.<ext>` placeholder so the engine always sees a file name.
pub fn derive_path(uri: &Url) -> PathBuf {
    if uri.scheme() == "file" {
        if let Ok(path) = uri.to_file_path() {
            return path;
        }
    }
    PathBuf::from(format!("nofile.{}", extension(uri.as_str())))
}

/// How an allow-listed document is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Plain source, parsed as a whole.
    Source,
    /// Host text with embedded expressions.
    Template,
}

impl DocumentKind {
    pub fn is_template(self) -> bool {
        matches!(self, DocumentKind::Template)
    }
}

/// Allow-list of extensions the scheduler will parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedExtensions {
    sources: Vec<String>,
    templates: Vec<String>,
}

impl SupportedExtensions {
    pub fn new<S, T>(sources: S, templates: T) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(normalize).collect(),
            templates: templates.into_iter().map(normalize).collect(),
        }
    }

    /// Classify an identity, or `None` when it is not allow-listed.
    pub fn classify(&self, uri: &Url) -> Option<DocumentKind> {
        let ext = extension(uri.as_str());
        if self.templates.iter().any(|t| t == ext) {
            Some(DocumentKind::Template)
        } else if self.sources.iter().any(|s| s == ext) {
            Some(DocumentKind::Source)
        } else {
            None
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }
}

impl Default for SupportedExtensions {
    fn default() -> Self {
        Self::new(["cel"], ["celtmpl"])
    }
}

/// Accept both `cel` and `.cel` in configuration.
fn normalize(ext: impl Into<String>) -> String {
    let ext = ext.into();
    match ext.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => ext,
    }
}
