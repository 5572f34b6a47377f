//! Document state and text utilities.
//!
//! This module provides:
//! - `Document` snapshots and the cached `Context` derived from them
//! - `DocumentStore`, the keyed container the scheduler owns
//! - identity helpers: path derivation and the extension allow-list
//! - `LineIndex` for byte offset -> line/column conversion

mod identity;
mod state;
mod text;

pub use identity::{derive_path, extension, DocumentKind, SupportedExtensions};
pub use state::{Context, Document, DocumentStore};
pub use text::LineIndex;
