//! Debounced parse scheduling and the per-document result cache.
//!
//! All state lives in one event loop task (the orchestrator). Callers talk to
//! it through a [`SchedulerHandle`]: edits and closes are fire-and-forget,
//! immediate parses wait for their reply. Debounce timers feed their fires
//! back into the same queue, so every state transition happens in arrival
//! order on a single task and nothing needs a lock.

mod debounce;
mod orchestrator;
mod pipeline;
mod publish;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tower_lsp::lsp_types::Url;

use crate::diagnostic::DiagnosticsSink;
use crate::document::{Context, Document, SupportedExtensions};
use crate::engine::{MetadataExtractor, ParseEngine};
use crate::telemetry::Telemetry;

use orchestrator::{Event, Orchestrator};
use pipeline::Pipeline;

pub use pipeline::PARSE_FAILURE_EVENT;
pub use publish::flatten;

/// Default quiet period before a debounced parse runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub debounce: Duration,
    pub extensions: SupportedExtensions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            extensions: SupportedExtensions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("parse scheduler is not running")]
    Stopped,
}

/// Handle to a running scheduler. Cheap to clone.
///
/// The scheduler stops once every handle has been dropped.
pub struct SchedulerHandle<T, M> {
    events: mpsc::UnboundedSender<Event<T, M>>,
}

impl<T, M> Clone for SchedulerHandle<T, M> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<T, M> SchedulerHandle<T, M> {
    /// Record new text for a document and (re)start its debounce window.
    pub fn edit(&self, document: Document) -> Result<(), SchedulerError> {
        self.send(Event::Edit(document))
    }

    /// Forget a document: cancel its timer, drop its cache, republish.
    pub fn close(&self, uri: Url) -> Result<(), SchedulerError> {
        self.send(Event::Close(uri))
    }

    /// Parse `document` now, or return the cache if it is already parsed at
    /// this version.
    pub async fn parse_now(&self, document: Document) -> Result<Context<T, M>, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.send(Event::ParseNow { document, reply })?;
        response.await.map_err(|_| SchedulerError::Stopped)
    }

    /// Blocking variant of [`parse_now`](Self::parse_now) for callers outside
    /// the async runtime. Panics if called from within an async context.
    pub fn parse_now_blocking(&self, document: Document) -> Result<Context<T, M>, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.send(Event::ParseNow { document, reply })?;
        response.blocking_recv().map_err(|_| SchedulerError::Stopped)
    }

    /// The cached context for `uri`, without scheduling anything.
    pub async fn cached(&self, uri: Url) -> Result<Option<Context<T, M>>, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.send(Event::Cached { uri, reply })?;
        response.await.map_err(|_| SchedulerError::Stopped)
    }

    fn send(&self, event: Event<T, M>) -> Result<(), SchedulerError> {
        self.events.send(event).map_err(|_| SchedulerError::Stopped)
    }
}

/// Start a scheduler on the current tokio runtime.
pub fn spawn<E, X>(
    config: SchedulerConfig,
    engine: E,
    extractor: X,
    sink: Arc<dyn DiagnosticsSink>,
    telemetry: Arc<dyn Telemetry>,
) -> SchedulerHandle<E::Tree, X::Metadata>
where
    E: ParseEngine,
    X: MetadataExtractor<E::Tree>,
{
    let (events, receiver) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(
        config,
        Pipeline::new(engine, extractor, telemetry),
        publish::Fanout::new(sink),
        &events,
    );
    tokio::spawn(orchestrator.run(receiver));
    SchedulerHandle { events }
}
