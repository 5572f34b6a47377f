//! LSP protocol adapters.
//!
//! This module provides:
//! - Diagnostics conversion and the client-backed diagnostics sink
//! - Document symbols built from extracted symbol metadata
//! - Telemetry forwarded as `telemetry/event` notifications

mod diagnostics;
mod symbols;
mod telemetry;

pub use diagnostics::{plan_publications, to_lsp_diagnostic, to_lsp_position, ClientSink};
pub use symbols::document_symbols;
pub use telemetry::ClientTelemetry;
