//! Per-version processing results and lifecycle state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::document::ResolvedDocument;
use crate::slug::SlugTable;

/// The result of processing one (surface, version) entry.
///
/// Cheap to clone: the resolved graph and slug tables are shared.
#[derive(Debug, Clone)]
pub struct ProcessedSchema {
    /// The resolved document.
    pub schema: Arc<ResolvedDocument>,
    /// Slug tables for tags and operations.
    pub slugs: Arc<SlugTable>,
    /// Version label.
    pub version: String,
    /// Navigation path the version is served under.
    pub navigation_path: String,
    /// Input key of the source document.
    pub input_file_path: String,
    /// Where readers can download the source document, if anywhere.
    pub download_url: Option<String>,
    /// Human-readable label.
    pub label: String,
}

/// Lifecycle of one version entry.
///
/// `Unprocessed → Processing → Processed | Failed`. A failed entry keeps its
/// last successful [`ProcessedSchema`] visible until the next success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    /// Registered, never processed in this session.
    Unprocessed,
    /// A processing request is in flight.
    Processing,
    /// The latest request succeeded.
    Processed,
    /// The latest request failed.
    Failed {
        /// Error text.
        error: String,
    },
}

impl EntryState {
    /// Whether the latest request failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Where the generated module for an input lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module name inside the store.
    pub name: String,
    /// Store location.
    pub location: String,
    /// Processing timestamp (Unix millis), strictly increasing per input.
    pub timestamp: i64,
    /// Content fingerprint of the module text.
    pub fingerprint: String,
}

impl ModuleRecord {
    /// Load specifier with the timestamp embedded to defeat stale caches.
    pub fn specifier(&self) -> String {
        format!("{}?t={}", self.location, self.timestamp)
    }
}
