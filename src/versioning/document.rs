//! The `__rerum` metadata block embedded in every stored document.
//!
//! `history.previous`/`history.next`/`history.prime` hold full `@id`
//! URLs, matching what a client sees on the wire — not bare `_id`s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A version's position in its lineage chain. `prime` holds `"root"`
/// on the first version of an object and the root's own `@id` on
/// every descendant, so a client can find the head of a lineage
/// without walking `previous` links one at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct History {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default)]
    pub next: Vec<String>,
    pub prime: String,
}

impl History {
    pub fn root() -> Self {
        Self { previous: None, next: Vec::new(), prime: "root".to_string() }
    }

    pub fn descendant_of(previous_at_id: String, prime: String) -> Self {
        Self { previous: Some(previous_at_id), next: Vec::new(), prime }
    }

    /// The `prime` a new descendant of this history should inherit:
    /// the owning document's own `@id` if this history is a root,
    /// otherwise the prime it already points at.
    pub fn prime_for_descendant(&self, owner_at_id: &str) -> String {
        if self.prime == "root" {
            owner_at_id.to_string()
        } else {
            self.prime.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RerumMeta {
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_overwritten: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_released: bool,
    #[serde(default)]
    pub releases: Vec<DateTime<Utc>>,
    pub history: History,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
}

impl RerumMeta {
    pub fn new_root(now: DateTime<Utc>, generated_by: Option<String>) -> Self {
        Self {
            created_at: now,
            is_overwritten: None,
            is_released: false,
            releases: Vec::new(),
            history: History::root(),
            generated_by,
        }
    }

    pub fn new_descendant(
        now: DateTime<Utc>,
        previous_at_id: String,
        prime: String,
        generated_by: Option<String>,
    ) -> Self {
        Self {
            created_at: now,
            is_overwritten: None,
            is_released: false,
            releases: Vec::new(),
            history: History::descendant_of(previous_at_id, prime),
            generated_by,
        }
    }

    pub fn embed(&self, doc: &mut Value) {
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("__rerum".to_string(), serde_json::to_value(self).expect("RerumMeta always serializes"));
        }
    }

    pub fn extract(doc: &Value) -> Option<Self> {
        doc.get("__rerum").and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The value exposed via `Current-Overwritten-Version` — the
    /// timestamp of the last in-place overwrite, or empty.
    pub fn overwritten_version(&self) -> String {
        self.is_overwritten.map(|t| t.to_rfc3339()).unwrap_or_default()
    }
}

/// Snapshot recorded on a tombstoned document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deleted {
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub object: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn root_history_has_no_previous() {
        let meta = RerumMeta::new_root(now(), Some("agent-1".to_string()));
        assert_eq!(meta.history.prime, "root");
        assert!(meta.history.previous.is_none());
    }

    #[test]
    fn descendant_history_points_at_root() {
        let meta = RerumMeta::new_descendant(now(), "http://e/v1".to_string(), "http://e/root".to_string(), None);
        assert_eq!(meta.history.previous.as_deref(), Some("http://e/v1"));
        assert_eq!(meta.history.prime, "http://e/root");
    }

    #[test]
    fn prime_for_descendant_of_root_uses_owner_at_id() {
        let root = History::root();
        assert_eq!(root.prime_for_descendant("http://e/root"), "http://e/root");
    }

    #[test]
    fn prime_for_descendant_of_non_root_is_inherited() {
        let mid = History::descendant_of("http://e/v1".to_string(), "http://e/root".to_string());
        assert_eq!(mid.prime_for_descendant("http://e/v2"), "http://e/root");
    }

    #[test]
    fn embed_then_extract_round_trips() {
        let meta = RerumMeta::new_root(now(), Some("agent-1".to_string()));
        let mut doc = serde_json::json!({"body": "x"});
        meta.embed(&mut doc);
        let extracted = RerumMeta::extract(&doc).unwrap();
        assert_eq!(extracted, meta);
    }

    #[test]
    fn overwritten_version_empty_until_set() {
        let meta = RerumMeta::new_root(now(), None);
        assert_eq!(meta.overwritten_version(), "");
    }
}
