//! The event loop that owns all scheduling state.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tower_lsp::lsp_types::Url;

use crate::document::{Context, Document, DocumentStore, SupportedExtensions};
use crate::engine::{MetadataExtractor, ParseEngine};

use super::debounce::{Debouncer, FireFn};
use super::pipeline::Pipeline;
use super::publish::Fanout;
use super::SchedulerConfig;

/// Everything the loop reacts to, in arrival order.
pub(crate) enum Event<T, M> {
    Edit(Document),
    Close(Url),
    ParseNow {
        document: Document,
        reply: oneshot::Sender<Context<T, M>>,
    },
    Cached {
        uri: Url,
        reply: oneshot::Sender<Option<Context<T, M>>>,
    },
    TimerFired {
        uri: Url,
        generation: u64,
    },
}

type ContextOf<E, X> =
    Context<<E as ParseEngine>::Tree, <X as MetadataExtractor<<E as ParseEngine>::Tree>>::Metadata>;

pub(crate) struct Orchestrator<E, X>
where
    E: ParseEngine,
    X: MetadataExtractor<E::Tree>,
{
    store: DocumentStore<E::Tree, X::Metadata>,
    debouncer: Debouncer,
    pipeline: Pipeline<E, X>,
    fanout: Fanout,
    extensions: SupportedExtensions,
}

impl<E, X> Orchestrator<E, X>
where
    E: ParseEngine,
    X: MetadataExtractor<E::Tree>,
{
    /// Build the orchestrator. Timer fires are fed back into `events`.
    ///
    /// The fire callback holds only a weak sender, so the loop ends once
    /// every handle is dropped.
    pub(crate) fn new(
        config: SchedulerConfig,
        pipeline: Pipeline<E, X>,
        fanout: Fanout,
        events: &mpsc::UnboundedSender<Event<E::Tree, X::Metadata>>,
    ) -> Self {
        let weak = events.downgrade();
        let fire: FireFn = Arc::new(move |uri, generation| {
            if let Some(events) = weak.upgrade() {
                let _ = events.send(Event::TimerFired { uri, generation });
            }
        });

        Self {
            store: DocumentStore::new(),
            debouncer: Debouncer::new(config.debounce, fire),
            pipeline,
            fanout,
            extensions: config.extensions,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Event<E::Tree, X::Metadata>>,
    ) {
        tracing::debug!(delay = ?self.debouncer.delay(), "parse scheduler started");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!("parse scheduler stopped");
    }

    fn handle(&mut self, event: Event<E::Tree, X::Metadata>) {
        match event {
            Event::Edit(document) => self.on_edit(document),
            Event::Close(uri) => self.on_close(&uri),
            Event::ParseNow { document, reply } => {
                let context = self.on_parse_now(document);
                // The caller may have given up waiting.
                let _ = reply.send(context);
            }
            Event::Cached { uri, reply } => {
                let _ = reply.send(self.store.get(&uri).cloned());
            }
            Event::TimerFired { uri, generation } => self.on_timer_fired(&uri, generation),
        }
    }

    fn on_edit(&mut self, document: Document) {
        if self.extensions.classify(&document.uri).is_none() {
            tracing::trace!(uri = %document.uri, "ignoring edit for unsupported document");
            return;
        }

        let uri = document.uri.clone();
        self.debouncer.arm(uri.clone());
        match self.store.get_mut(&uri) {
            Some(context) => context.update_document(document),
            None => self.store.put(uri.clone(), Context::new(document)),
        }
        tracing::debug!(%uri, "edit received, parse debounced");
    }

    fn on_close(&mut self, uri: &Url) {
        self.debouncer.cancel(uri);
        if self.store.delete(uri).is_some() {
            tracing::debug!(%uri, "document closed");
        }
        self.fanout.publish(&self.store);
    }

    fn on_timer_fired(&mut self, uri: &Url, generation: u64) {
        if !self.debouncer.take_fired(uri, generation) {
            tracing::trace!(%uri, generation, "discarding stale timer");
            return;
        }
        let Some(kind) = self.extensions.classify(uri) else {
            return;
        };
        let Some(context) = self.store.get_mut(uri) else {
            tracing::debug!(%uri, "timer fired for a document that is no longer tracked");
            return;
        };

        tracing::debug!(%uri, version = context.document.version, "debounced parse");
        self.pipeline.run(&context.document, kind).apply(context);
        self.fanout.publish(&self.store);
    }

    fn on_parse_now(&mut self, document: Document) -> ContextOf<E, X> {
        let Some(kind) = self.extensions.classify(&document.uri) else {
            return Context::new(document);
        };
        let uri = document.uri.clone();

        if let Some(cached) = self.store.get(&uri) {
            if cached.is_parsed_at(document.version) {
                // A newer edit may still be waiting on its timer; leave it
                // armed so that edit is not lost.
                if cached.document.version <= document.version {
                    self.debouncer.cancel(&uri);
                }
                tracing::debug!(%uri, version = document.version, "serving cached parse");
                return cached.clone();
            }
        }

        // The store already holds a newer edit: answer this request without
        // touching that snapshot or its timer.
        if let Some(stored) = self.store.get(&uri) {
            if stored.document.version > document.version {
                let mut context = Context::new(document);
                tracing::debug!(
                    %uri,
                    version = context.document.version,
                    stored = stored.document.version,
                    "immediate parse of a superseded version"
                );
                self.pipeline.run(&context.document, kind).apply(&mut context);
                return context;
            }
        }

        self.debouncer.cancel(&uri);
        let mut context = Context::new(document);
        tracing::debug!(%uri, version = context.document.version, "immediate parse");
        self.pipeline.run(&context.document, kind).apply(&mut context);
        self.store.put(uri, context.clone());
        self.fanout.publish(&self.store);
        context
    }
}
