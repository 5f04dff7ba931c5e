//! Create/update/patch/set/unset/overwrite/delete/release semantics.
//!
//! Every operation but `overwrite` and `release` inserts a brand-new
//! document rather than mutating one in place — this is a versioned
//! store, so history is data, not metadata lost on the next write.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::invalidation::{MutationEvent, MutationKind};
use crate::store::DocumentStore;

use super::document::{Deleted, History, RerumMeta};
use super::errors::VersioningError;

const RESERVED_FIELDS: [&str; 3] = ["_id", "@id", "__rerum"];

fn strip_reserved(value: &Value) -> Map<String, Value> {
    let mut fields = value.as_object().cloned().unwrap_or_default();
    for field in RESERVED_FIELDS {
        fields.remove(field);
    }
    fields
}

pub struct VersioningWriter {
    store: Arc<dyn DocumentStore>,
    id_prefix: String,
}

impl VersioningWriter {
    pub fn new(store: Arc<dyn DocumentStore>, id_prefix: String) -> Self {
        Self { store, id_prefix }
    }

    fn at_id(&self, id: &str) -> String {
        format!("{}{id}", self.id_prefix)
    }

    fn id_from_at_id<'a>(&self, at_id: &'a str) -> Option<&'a str> {
        at_id.strip_prefix(self.id_prefix.as_str())
    }

    fn check_agent(&self, doc: &Value, agent: &str) -> Result<(), VersioningError> {
        let meta = RerumMeta::extract(doc)
            .ok_or_else(|| VersioningError::CorruptMetadata(doc_id(doc)))?;
        if meta.generated_by.as_deref() != Some(agent) {
            return Err(VersioningError::Forbidden);
        }
        Ok(())
    }

    pub async fn create(
        &self,
        body: Value,
        agent: Option<String>,
        slug: Option<String>,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        let id = match slug {
            Some(slug) => {
                if self.store.find_one(&slug).await?.is_some() {
                    return Err(VersioningError::SlugConflict(slug));
                }
                slug
            }
            None => Uuid::new_v4().to_string(),
        };
        let at_id = self.at_id(&id);

        let mut fields = strip_reserved(&body);
        fields.insert("_id".to_string(), Value::String(id));
        fields.insert("@id".to_string(), Value::String(at_id));
        let mut doc = Value::Object(fields);

        RerumMeta::new_root(Utc::now(), agent).embed(&mut doc);

        let inserted = self.store.insert_one(doc).await?;
        let event = MutationEvent::new(MutationKind::Create, None, Some(inserted.clone()));
        Ok((inserted, event))
    }

    /// Full replace: the new version's user content is exactly the
    /// caller-supplied body (reserved fields stripped).
    pub async fn update(
        &self,
        id: &str,
        body: Value,
        agent: &str,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        let new_fields = strip_reserved(&body);
        self.new_version(id, new_fields, agent, MutationKind::Update).await
    }

    /// Merge onto `previous`, rejecting any key the previous document
    /// did not already have.
    pub async fn patch(
        &self,
        id: &str,
        payload: Value,
        agent: &str,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        let previous = self.store.find_one(id).await?.ok_or_else(|| VersioningError::NotFound(id.to_string()))?;
        let previous_fields = strip_reserved(&previous);
        let incoming = strip_reserved(&payload);

        let unknown: Vec<String> =
            incoming.keys().filter(|k| !previous_fields.contains_key(*k)).cloned().collect();
        if !unknown.is_empty() {
            return Err(VersioningError::PatchIntroducedNewFields(unknown));
        }

        let mut new_fields = previous_fields;
        new_fields.extend(incoming);
        self.new_version_from(previous, new_fields, agent, MutationKind::Update).await
    }

    /// Merge onto `previous`, adding or replacing any key the caller
    /// sends.
    pub async fn set(
        &self,
        id: &str,
        payload: Value,
        agent: &str,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        let previous = self.store.find_one(id).await?.ok_or_else(|| VersioningError::NotFound(id.to_string()))?;
        let mut new_fields = strip_reserved(&previous);
        new_fields.extend(strip_reserved(&payload));
        self.new_version_from(previous, new_fields, agent, MutationKind::Update).await
    }

    /// Remove every key from `previous` whose value the caller sent
    /// as `null`.
    pub async fn unset(
        &self,
        id: &str,
        payload: Value,
        agent: &str,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        let previous = self.store.find_one(id).await?.ok_or_else(|| VersioningError::NotFound(id.to_string()))?;
        let mut new_fields = strip_reserved(&previous);
        for (key, value) in strip_reserved(&payload) {
            if value.is_null() {
                new_fields.remove(&key);
            }
        }
        self.new_version_from(previous, new_fields, agent, MutationKind::Update).await
    }

    async fn new_version(
        &self,
        id: &str,
        new_fields: Map<String, Value>,
        agent: &str,
        kind: MutationKind,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        let previous = self.store.find_one(id).await?.ok_or_else(|| VersioningError::NotFound(id.to_string()))?;
        self.new_version_from(previous, new_fields, agent, kind).await
    }

    async fn new_version_from(
        &self,
        previous: Value,
        mut new_fields: Map<String, Value>,
        agent: &str,
        kind: MutationKind,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        self.check_agent(&previous, agent)?;
        let previous_meta = RerumMeta::extract(&previous)
            .ok_or_else(|| VersioningError::CorruptMetadata(doc_id(&previous)))?;
        let previous_at_id = previous
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| VersioningError::CorruptMetadata(doc_id(&previous)))?
            .to_string();

        let new_id = Uuid::new_v4().to_string();
        let new_at_id = self.at_id(&new_id);
        let prime = previous_meta.history.prime_for_descendant(&previous_at_id);

        new_fields.insert("_id".to_string(), Value::String(new_id));
        new_fields.insert("@id".to_string(), Value::String(new_at_id.clone()));
        let mut new_doc = Value::Object(new_fields);
        RerumMeta::new_descendant(Utc::now(), previous_at_id, prime, Some(agent.to_string())).embed(&mut new_doc);

        let inserted = self.store.insert_one(new_doc).await?;

        let mut updated_previous = previous.clone();
        let mut previous_meta = previous_meta;
        previous_meta.history.next.push(new_at_id);
        previous_meta.embed(&mut updated_previous);
        let previous_id = doc_id(&previous);
        self.store.update_one(&previous_id, updated_previous).await?;

        let event = MutationEvent::new(kind, Some(previous), Some(inserted.clone()));
        Ok((inserted, event))
    }

    /// In-place, optimistic-locking replace. `expected_version` is the
    /// caller's `If-Overwritten-Version` header (or body
    /// `__expectedVersion`); `None` skips the precondition check.
    pub async fn overwrite(
        &self,
        id: &str,
        body: Value,
        agent: &str,
        expected_version: Option<String>,
    ) -> Result<(Value, MutationEvent), VersioningError> {
        let current = self.store.find_one(id).await?.ok_or_else(|| VersioningError::NotFound(id.to_string()))?;
        self.check_agent(&current, agent)?;
        let mut meta = RerumMeta::extract(&current)
            .ok_or_else(|| VersioningError::CorruptMetadata(doc_id(&current)))?;

        if let Some(expected) = expected_version {
            let got = meta.overwritten_version();
            if expected != got {
                return Err(VersioningError::VersionMismatch { expected, got });
            }
        }

        let mut new_fields = strip_reserved(&body);
        new_fields.insert("_id".to_string(), Value::String(doc_id(&current)));
        let at_id = current.get("@id").cloned().unwrap_or(Value::Null);
        new_fields.insert("@id".to_string(), at_id);

        meta.is_overwritten = Some(Utc::now());
        let mut updated = Value::Object(new_fields);
        meta.embed(&mut updated);

        let inserted = self.store.update_one(&doc_id(&current), updated).await?;
        let event = MutationEvent::new(MutationKind::Overwrite, Some(current), Some(inserted.clone()));
        Ok((inserted, event))
    }

    /// Tombstone the document, rewiring lineage so neighbors skip it,
    /// and carry `before` (the live document) on the returned event
    /// with no `after` (no live version replaces it).
    pub async fn delete(&self, id: &str, agent: &str) -> Result<MutationEvent, VersioningError> {
        let current = self.store.find_one(id).await?.ok_or_else(|| VersioningError::NotFound(id.to_string()))?;
        self.check_agent(&current, agent)?;
        let meta = RerumMeta::extract(&current)
            .ok_or_else(|| VersioningError::CorruptMetadata(doc_id(&current)))?;
        let at_id = current
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| VersioningError::CorruptMetadata(doc_id(&current)))?
            .to_string();

        if let Some(previous_at_id) = &meta.history.previous {
            if let Some(previous_id) = self.id_from_at_id(previous_at_id).map(str::to_string) {
                if let Some(mut previous_doc) = self.store.find_one(&previous_id).await? {
                    if let Some(mut previous_meta) = RerumMeta::extract(&previous_doc) {
                        previous_meta.history.next.retain(|next| next != &at_id);
                        previous_meta.history.next.extend(meta.history.next.clone());
                        previous_meta.embed(&mut previous_doc);
                        self.store.update_one(&previous_id, previous_doc).await?;
                    }
                }
            }
        }

        for child_at_id in &meta.history.next {
            if let Some(child_id) = self.id_from_at_id(child_at_id).map(str::to_string) {
                if let Some(mut child_doc) = self.store.find_one(&child_id).await? {
                    if let Some(mut child_meta) = RerumMeta::extract(&child_doc) {
                        child_meta.history.previous = meta.history.previous.clone();
                        child_meta.embed(&mut child_doc);
                        self.store.update_one(&child_id, child_doc).await?;
                    }
                }
            }
        }

        let snapshot = current.clone();
        let tombstone_history = History {
            previous: meta.history.previous.clone(),
            next: Vec::new(),
            prime: meta.history.prime.clone(),
        };
        let mut tombstone_meta = meta;
        tombstone_meta.history = tombstone_history;

        let mut tombstone = serde_json::json!({
            "_id": doc_id(&current),
            "@id": at_id,
        });
        tombstone_meta.embed(&mut tombstone);
        if let Some(obj) = tombstone.as_object_mut() {
            obj.insert(
                "__deleted".to_string(),
                serde_json::to_value(Deleted { time: Utc::now(), agent: Some(agent.to_string()), object: snapshot.clone() })
                    .expect("Deleted always serializes"),
            );
        }

        self.store.update_one(&doc_id(&current), tombstone).await?;
        Ok(MutationEvent::new(MutationKind::Delete, Some(snapshot), None))
    }

    /// Marks a document released. Never creates a new version and
    /// never invalidates the cache (the caller must tag the resulting
    /// event `MutationKind::Release`, which the invalidation engine
    /// always treats as a no-op).
    pub async fn release(&self, id: &str, agent: &str) -> Result<(Value, MutationEvent), VersioningError> {
        let current = self.store.find_one(id).await?.ok_or_else(|| VersioningError::NotFound(id.to_string()))?;
        self.check_agent(&current, agent)?;
        let mut meta = RerumMeta::extract(&current)
            .ok_or_else(|| VersioningError::CorruptMetadata(doc_id(&current)))?;

        let now = Utc::now();
        meta.is_released = true;
        meta.releases.push(now);

        let mut updated = current.clone();
        meta.embed(&mut updated);
        let stored = self.store.update_one(&doc_id(&current), updated).await?;

        let event = MutationEvent::new(MutationKind::Release, Some(current), Some(stored.clone()));
        Ok((stored, event))
    }
}

fn doc_id(doc: &Value) -> String {
    doc.get("_id").and_then(Value::as_str).unwrap_or_default().to_string()
}
