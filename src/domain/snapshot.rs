use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Composite signature document produced by one collection pass.
///
/// Categories are keyed by source name in a sorted map, so two snapshots
/// taken from the same registry always carry the same key set in the same
/// order regardless of which source finished first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique id for this collection pass
    pub collection_id: String,
    /// Version of the collector that produced it
    pub collector_version: String,
    /// When the collection pass started
    pub captured_at: DateTime<Utc>,
    /// Wall-clock duration of the full pass in milliseconds
    pub elapsed_ms: u64,
    /// Category name to category payload
    pub categories: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Build the failure marker recorded in place of a category payload
    /// when its source errors, panics, or exceeds its time budget.
    pub fn error_marker(message: impl Into<String>) -> Value {
        json!({
            "error": true,
            "message": message.into(),
        })
    }

    /// Check whether a category payload is a failure marker
    pub fn is_error_marker(value: &Value) -> bool {
        value
            .get("error")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Get one category payload by name
    pub fn category(&self, name: &str) -> Option<&Value> {
        self.categories.get(name)
    }

    /// Category names in sorted order
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    /// Names of categories whose sources failed this pass
    pub fn failed_categories(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|(_, v)| Self::is_error_marker(v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// True when every registered source produced a real payload
    pub fn is_complete(&self) -> bool {
        self.failed_categories().is_empty()
    }
}
