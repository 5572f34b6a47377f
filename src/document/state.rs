//! Documents, their cached parse state, and the store that owns it.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::lsp_types::Url;

use crate::diagnostic::Diagnostic;

use super::identity::derive_path;

/// A snapshot of an editable text buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: Url,
    pub text: Arc<str>,
    /// Version from the client; increases with every edit.
    pub version: i32,
    /// Path derived from `uri`.
    pub path: PathBuf,
}

impl Document {
    pub fn new(uri: Url, text: impl Into<Arc<str>>, version: i32) -> Self {
        let path = derive_path(&uri);
        Self {
            uri,
            text: text.into(),
            version,
            path,
        }
    }
}

/// Cached parse state for one document.
///
/// `tree` and `metadata` are shared, so cloning a context is cheap and two
/// clones of the same cache entry compare equal.
pub struct Context<T, M> {
    /// Most recently received snapshot.
    pub document: Document,
    pub path: PathBuf,
    /// `None` when the last parse failed entirely (or none has run yet).
    pub tree: Option<Arc<T>>,
    pub diagnostics: Vec<Diagnostic>,
    /// Present only when `tree` is.
    pub metadata: Option<Arc<M>>,
    /// Version of the snapshot the cached results correspond to.
    pub parsed_version: Option<i32>,
}

impl<T, M> Context<T, M> {
    /// An empty context that has not been parsed.
    pub fn new(document: Document) -> Self {
        let path = document.path.clone();
        Self {
            document,
            path,
            tree: None,
            diagnostics: Vec::new(),
            metadata: None,
            parsed_version: None,
        }
    }

    /// Whether the cached results reflect `version`.
    pub fn is_parsed_at(&self, version: i32) -> bool {
        self.parsed_version == Some(version)
    }

    /// Whether the cached results reflect the stored snapshot.
    pub fn is_fresh(&self) -> bool {
        self.is_parsed_at(self.document.version)
    }

    /// Replace the stored snapshot, keeping cached results.
    pub(crate) fn update_document(&mut self, document: Document) {
        self.path = document.path.clone();
        self.document = document;
    }
}

impl<T, M> Clone for Context<T, M> {
    fn clone(&self) -> Self {
        Self {
            document: self.document.clone(),
            path: self.path.clone(),
            tree: self.tree.clone(),
            diagnostics: self.diagnostics.clone(),
            metadata: self.metadata.clone(),
            parsed_version: self.parsed_version,
        }
    }
}

/// Trees and metadata compare by identity: equal contexts share the same
/// parse result.
impl<T, M> PartialEq for Context<T, M> {
    fn eq(&self, other: &Self) -> bool {
        fn same<X>(a: &Option<Arc<X>>, b: &Option<Arc<X>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }

        self.document == other.document
            && self.path == other.path
            && self.parsed_version == other.parsed_version
            && self.diagnostics == other.diagnostics
            && same(&self.tree, &other.tree)
            && same(&self.metadata, &other.metadata)
    }
}

impl<T, M> fmt::Debug for Context<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("uri", &self.document.uri.as_str())
            .field("version", &self.document.version)
            .field("path", &self.path)
            .field("has_tree", &self.tree.is_some())
            .field("diagnostics", &self.diagnostics.len())
            .field("has_metadata", &self.metadata.is_some())
            .field("parsed_version", &self.parsed_version)
            .finish()
    }
}

/// Keyed storage for document contexts.
///
/// Owned by the scheduler's event loop; not synchronized.
pub struct DocumentStore<T, M> {
    contexts: HashMap<Url, Context<T, M>>,
}

impl<T, M> DocumentStore<T, M> {
    pub fn new() -> Self {
        Self {
            contexts: HashMap::new(),
        }
    }

    pub fn get(&self, uri: &Url) -> Option<&Context<T, M>> {
        self.contexts.get(uri)
    }

    pub fn get_mut(&mut self, uri: &Url) -> Option<&mut Context<T, M>> {
        self.contexts.get_mut(uri)
    }

    pub fn put(&mut self, uri: Url, context: Context<T, M>) {
        self.contexts.insert(uri, context);
    }

    pub fn delete(&mut self, uri: &Url) -> Option<Context<T, M>> {
        self.contexts.remove(uri)
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.contexts.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Url, &Context<T, M>)> {
        self.contexts.iter()
    }
}

impl<T, M> Default for DocumentStore<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(uri: &str, text: &str, version: i32) -> Document {
        Document::new(Url::parse(uri).unwrap(), text, version)
    }

    #[test]
    fn new_context_is_unparsed() {
        let ctx: Context<(), ()> = Context::new(doc("doc://a.cel", "1", 3));
        assert_eq!(ctx.parsed_version, None);
        assert!(!ctx.is_fresh());
        assert!(ctx.tree.is_none());
        assert_eq!(ctx.path, PathBuf::from("nofile.cel"));
    }

    #[test]
    fn updating_document_keeps_results() {
        let mut ctx: Context<u32, ()> = Context::new(doc("doc://a.cel", "1", 1));
        ctx.tree = Some(Arc::new(7));
        ctx.parsed_version = Some(1);
        assert!(ctx.is_fresh());

        ctx.update_document(doc("doc://a.cel", "1 + 1", 2));
        assert_eq!(ctx.document.version, 2);
        assert_eq!(ctx.tree.as_deref(), Some(&7));
        assert!(!ctx.is_fresh());
        assert!(ctx.is_parsed_at(1));
    }

    #[test]
    fn clones_compare_equal_by_shared_tree() {
        let mut ctx: Context<String, ()> = Context::new(doc("doc://a.cel", "x", 1));
        ctx.tree = Some(Arc::new("tree".to_string()));
        let copy = ctx.clone();
        assert_eq!(ctx, copy);

        let mut reparsed = ctx.clone();
        reparsed.tree = Some(Arc::new("tree".to_string()));
        assert_ne!(ctx, reparsed);
    }

    #[test]
    fn store_put_get_delete() {
        let mut store: DocumentStore<(), ()> = DocumentStore::new();
        let uri = Url::parse("doc://a.cel").unwrap();
        assert!(store.get(&uri).is_none());

        store.put(uri.clone(), Context::new(doc("doc://a.cel", "x", 1)));
        assert!(store.contains(&uri));
        assert_eq!(store.len(), 1);

        assert!(store.delete(&uri).is_some());
        assert!(store.delete(&uri).is_none());
        assert!(store.is_empty());
    }
}
