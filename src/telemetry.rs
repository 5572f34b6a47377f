//! Best-effort telemetry events.

use serde_json::Value;

/// Fire-and-forget event reporting. Failures to deliver are swallowed.
pub trait Telemetry: Send + Sync {
    fn report(&self, event: &str, payload: Value);
}

/// Telemetry that only records events in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn report(&self, event: &str, payload: Value) {
        tracing::info!(target: "celsync::telemetry", event, %payload, "telemetry event");
    }
}
