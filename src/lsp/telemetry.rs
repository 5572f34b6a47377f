//! Telemetry delivered as LSP `telemetry/event` notifications.

use serde_json::{json, Value};
use tower_lsp::Client;

use crate::telemetry::Telemetry;

#[derive(Clone)]
pub struct ClientTelemetry {
    client: Client,
}

impl ClientTelemetry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Telemetry for ClientTelemetry {
    fn report(&self, event: &str, payload: Value) {
        tracing::debug!(event, "sending telemetry event");
        let client = self.client.clone();
        let data = json!({ "event": event, "payload": payload });
        tokio::spawn(async move {
            client.telemetry_event(data).await;
        });
    }
}
