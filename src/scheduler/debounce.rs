//! Per-document debounce timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Url;

/// Callback invoked when a timer expires, with the document and the
/// generation the timer was armed with.
pub(crate) type FireFn = Arc<dyn Fn(Url, u64) + Send + Sync>;

struct TimerSlot {
    generation: u64,
    handle: JoinHandle<()>,
}

/// At most one pending timer per document.
///
/// Timers only sleep and call the fire callback; they never touch scheduler
/// state. Every arm gets a fresh generation so that a fire which raced a
/// cancel or re-arm can be recognized as stale by `take_fired`.
pub(crate) struct Debouncer {
    delay: Duration,
    fire: FireFn,
    slots: HashMap<Url, TimerSlot>,
    next_generation: u64,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration, fire: FireFn) -> Self {
        Self {
            delay,
            fire,
            slots: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Arm (or re-arm) the timer for `uri`. Returns the new generation.
    pub(crate) fn arm(&mut self, uri: Url) -> u64 {
        self.cancel(&uri);

        self.next_generation += 1;
        let generation = self.next_generation;
        let delay = self.delay;
        let fire = Arc::clone(&self.fire);
        let key = uri.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(key, generation);
        });

        self.slots.insert(uri, TimerSlot { generation, handle });
        generation
    }

    /// Cancel and forget the timer for `uri`. Returns whether one was pending.
    pub(crate) fn cancel(&mut self, uri: &Url) -> bool {
        match self.slots.remove(uri) {
            Some(slot) => {
                slot.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Clear the slot for a fired timer.
    ///
    /// Returns `false` when the fire is stale: the slot was cancelled or
    /// re-armed after this timer was scheduled.
    pub(crate) fn take_fired(&mut self, uri: &Url, generation: u64) -> bool {
        match self.slots.get(uri) {
            Some(slot) if slot.generation == generation => {
                self.slots.remove(uri);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, uri: &Url) -> bool {
        self.slots.contains_key(uri)
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.handle.abort();
        }
    }
}
