//! A single write, as seen by the invalidation engine.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Patch,
    Overwrite,
    Delete,
    /// Re-exposes a soft-deleted document at a new id. Never
    /// invalidates: it introduces no document that could already be
    /// sitting in a cached result set.
    Release,
}

#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub kind: MutationKind,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl MutationEvent {
    pub fn new(kind: MutationKind, before: Option<Value>, after: Option<Value>) -> Self {
        Self { kind, before, after }
    }

    /// Ids whose `id:{x}` cache entry must be evicted, per the
    /// mutation kind. Create mints a document that cannot already be
    /// cached, so it contributes nothing here.
    pub fn scalar_ids(&self) -> Vec<String> {
        match self.kind {
            MutationKind::Create | MutationKind::Release => Vec::new(),
            MutationKind::Overwrite => self.after.as_ref().and_then(extract_id).into_iter().collect(),
            MutationKind::Update | MutationKind::Patch => {
                [self.before.as_ref().and_then(extract_id), self.after.as_ref().and_then(extract_id)]
                    .into_iter()
                    .flatten()
                    .collect()
            }
            MutationKind::Delete => self.before.as_ref().and_then(extract_id).into_iter().collect(),
        }
    }

    /// Ids whose `history:{x}`/`since:{x}` cache entries must be
    /// evicted. Update/patch touch both endpoints of the edit plus the
    /// previous document's own lineage pointers (its `next` list just
    /// grew); delete only has a `before` state to draw pointers from;
    /// overwrite rewires no lineage, so it contributes nothing here.
    pub fn lineage_ids(&self) -> Vec<String> {
        match self.kind {
            MutationKind::Create | MutationKind::Release | MutationKind::Overwrite => Vec::new(),
            MutationKind::Update | MutationKind::Patch => {
                let mut ids: Vec<String> = [
                    self.before.as_ref().and_then(extract_id),
                    self.after.as_ref().and_then(extract_id),
                ]
                .into_iter()
                .flatten()
                .collect();
                if let Some(after) = &self.after {
                    ids.extend(history_pointer_ids(after));
                }
                ids
            }
            MutationKind::Delete => {
                let mut ids: Vec<String> = self.before.as_ref().and_then(extract_id).into_iter().collect();
                if let Some(before) = &self.before {
                    ids.extend(history_pointer_ids(before));
                }
                ids
            }
        }
    }
}

/// Pull the document id out of a stored document's `_id` field.
pub fn extract_id(doc: &Value) -> Option<String> {
    doc.get("_id").and_then(Value::as_str).map(str::to_string)
}

/// `__rerum.history.previous`/`.prime`, each resolved through
/// [`extract_id_from_at_id`] rather than `extract_id` since they hold
/// full `@id` URLs, not bare ids.
fn history_pointer_ids(doc: &Value) -> Vec<String> {
    let Some(history) = doc.get("__rerum").and_then(|m| m.get("history")) else {
        return Vec::new();
    };
    [history.get("previous").and_then(Value::as_str), history.get("prime").and_then(Value::as_str)]
        .into_iter()
        .flatten()
        .filter_map(extract_id_from_at_id)
        .collect()
}

/// Resolve an `@id` URL (or bare id) to the id used in scalar cache
/// keys: the trailing path segment after the last `/`. Empty input and
/// the literal `"root"` (the un-dereferenceable sentinel `history.prime`
/// carries on a root document) both resolve to nothing.
fn extract_id_from_at_id(at_id: &str) -> Option<String> {
    if at_id.is_empty() || at_id == "root" {
        return None;
    }
    let id = at_id.rsplit('/').next().unwrap_or(at_id);
    if id.is_empty() || id == "root" {
        None
    } else {
        Some(id.to_string())
    }
}
