//! Fan-out of diagnostics across all tracked documents.

use std::sync::Arc;

use crate::diagnostic::{Diagnostic, DiagnosticsSink};
use crate::document::DocumentStore;

/// Every tracked document's latest diagnostics, concatenated.
///
/// Order across documents is unspecified; order within a document is kept.
pub fn flatten<T, M>(store: &DocumentStore<T, M>) -> Vec<Diagnostic> {
    store
        .iter()
        .flat_map(|(_, context)| context.diagnostics.iter().cloned())
        .collect()
}

pub(crate) struct Fanout {
    sink: Arc<dyn DiagnosticsSink>,
}

impl Fanout {
    pub(crate) fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn publish<T, M>(&self, store: &DocumentStore<T, M>) {
        let diagnostics = flatten(store);
        tracing::debug!(
            documents = store.len(),
            diagnostics = diagnostics.len(),
            "publishing diagnostics"
        );
        self.sink.publish(diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tower_lsp::lsp_types::Url;

    use super::*;
    use crate::diagnostic::{Issue, SourcePosition};
    use crate::document::{Context, Document};

    fn context(uri: &str, messages: &[&str]) -> Context<(), ()> {
        let document = Document::new(Url::parse(uri).unwrap(), "", 1);
        let mut context = Context::new(document);
        context.diagnostics = messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                Diagnostic::from_issue(
                    &context.document.uri,
                    &context.path,
                    "test",
                    Issue::error(SourcePosition::new(i as u32 + 1, 1), *m),
                )
            })
            .collect();
        context
    }

    #[test]
    fn flatten_keeps_per_document_order() {
        let mut store = DocumentStore::new();
        store.put(Url::parse("doc://a.ex").unwrap(), context("doc://a.ex", &["a1", "a2"]));
        store.put(Url::parse("doc://b.ex").unwrap(), context("doc://b.ex", &["b1"]));
        store.put(Url::parse("doc://c.ex").unwrap(), context("doc://c.ex", &[]));

        let flat = flatten(&store);
        assert_eq!(flat.len(), 3);

        let a: Vec<_> = flat
            .iter()
            .filter(|d| d.uri.as_str() == "doc://a.ex")
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(a, vec!["a1", "a2"]);
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<usize>>);

    impl DiagnosticsSink for Collect {
        fn publish(&self, diagnostics: Vec<Diagnostic>) {
            self.0.lock().unwrap().push(diagnostics.len());
        }
    }

    #[test]
    fn fanout_hands_everything_to_the_sink() {
        let sink = Arc::new(Collect::default());
        let fanout = Fanout::new(sink.clone());

        let mut store = DocumentStore::new();
        fanout.publish(&store);
        store.put(Url::parse("doc://a.ex").unwrap(), context("doc://a.ex", &["x", "y"]));
        fanout.publish(&store);

        assert_eq!(*sink.0.lock().unwrap(), vec![0, 2]);
    }
}
