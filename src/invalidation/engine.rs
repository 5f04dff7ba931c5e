//! Decides which cached keys a mutation invalidates.

use serde_json::Value;

use crate::keys::{parse_key, parse_predicate, Namespace, ParsedKey};

use super::event::{MutationEvent, MutationKind};

/// Stateless: every decision is a pure function of the mutation and
/// the key being tested, so one engine instance serves every worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvalidationEngine;

impl InvalidationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Of `cache_keys` (a snapshot of the cache's current key set),
    /// return the ones this mutation invalidates.
    pub fn keys_to_invalidate(&self, cache_keys: &[String], event: &MutationEvent) -> Vec<String> {
        cache_keys.iter().filter(|key| self.should_invalidate(key, event)).cloned().collect()
    }

    fn should_invalidate(&self, key: &str, event: &MutationEvent) -> bool {
        if matches!(event.kind, MutationKind::Release) {
            return false;
        }
        match parse_key(key) {
            Some(ParsedKey::Scalar { namespace: Namespace::Id, id }) => event.scalar_ids().iter().any(|x| x == &id),
            Some(ParsedKey::Scalar { namespace: Namespace::History | Namespace::Since, id }) => {
                event.lineage_ids().iter().any(|x| x == &id)
            }
            Some(ParsedKey::Scalar { .. }) => false,
            // Full-text search has no predicate to evaluate a document
            // against (the stored payload is free text, not a field
            // matcher), so any write conservatively invalidates every
            // cached search result rather than risk missing a match.
            Some(ParsedKey::Structured { namespace: Namespace::Search | Namespace::SearchPhrase, .. }) => true,
            Some(ParsedKey::Structured { cached, .. }) => self.structured_key_applies(&cached, event),
            // A key this engine cannot parse back is treated
            // conservatively: evict rather than risk serving stale data.
            None => true,
        }
    }

    fn structured_key_applies(&self, cached: &Value, event: &MutationEvent) -> bool {
        let conditions = parse_predicate(cached);
        let matches = |doc: &Option<Value>| doc.as_ref().is_some_and(|d| crate::keys::evaluate(d, &conditions));
        matches(&event.after) || matches(&event.before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{scalar_key, structured_key};
    use serde_json::json;

    #[test]
    fn scalar_key_invalidated_on_matching_id() {
        let engine = InvalidationEngine::new();
        let event = MutationEvent::new(MutationKind::Update, None, Some(json!({"_id": "doc1"})));
        let key = scalar_key(Namespace::Id, "doc1");
        assert!(engine.keys_to_invalidate(&[key], &event).len() == 1);
    }

    #[test]
    fn scalar_key_untouched_for_other_id() {
        let engine = InvalidationEngine::new();
        let event = MutationEvent::new(MutationKind::Update, None, Some(json!({"_id": "doc1"})));
        let key = scalar_key(Namespace::Id, "doc2");
        assert!(engine.keys_to_invalidate(&[key], &event).is_empty());
    }

    #[test]
    fn structured_key_invalidated_when_predicate_matches_after_state() {
        let engine = InvalidationEngine::new();
        let query = json!({"type": "Annotation"});
        let key = structured_key(Namespace::Query, &query, 10, 0);
        let event = MutationEvent::new(
            MutationKind::Create,
            None,
            Some(json!({"_id": "d1", "type": "Annotation"})),
        );
        assert_eq!(engine.keys_to_invalidate(&[key], &event).len(), 1);
    }

    #[test]
    fn structured_key_invalidated_when_predicate_matched_before_state() {
        let engine = InvalidationEngine::new();
        let query = json!({"type": "Annotation"});
        let key = structured_key(Namespace::Query, &query, 10, 0);
        let event = MutationEvent::new(
            MutationKind::Delete,
            Some(json!({"_id": "d1", "type": "Annotation"})),
            None,
        );
        assert_eq!(engine.keys_to_invalidate(&[key], &event).len(), 1);
    }

    #[test]
    fn structured_key_untouched_when_neither_state_matches() {
        let engine = InvalidationEngine::new();
        let query = json!({"type": "Annotation"});
        let key = structured_key(Namespace::Query, &query, 10, 0);
        let event = MutationEvent::new(
            MutationKind::Update,
            Some(json!({"_id": "d1", "type": "Other"})),
            Some(json!({"_id": "d1", "type": "Other"})),
        );
        assert!(engine.keys_to_invalidate(&[key], &event).is_empty());
    }

    #[test]
    fn search_keys_invalidate_unconditionally_on_any_write() {
        let engine = InvalidationEngine::new();
        let key = structured_key(Namespace::Search, &json!({"q": "hello"}), 10, 0);
        let event = MutationEvent::new(MutationKind::Create, None, Some(json!({"_id": "d1", "body": "unrelated"})));
        assert_eq!(engine.keys_to_invalidate(&[key], &event).len(), 1);
    }

    #[test]
    fn release_never_invalidates() {
        let engine = InvalidationEngine::new();
        let id_key = scalar_key(Namespace::Id, "doc1");
        let event = MutationEvent::new(MutationKind::Release, None, Some(json!({"_id": "doc1"})));
        assert!(engine.keys_to_invalidate(&[id_key], &event).is_empty());
    }

    #[test]
    fn update_invalidates_both_the_previous_and_new_id() {
        let engine = InvalidationEngine::new();
        let previous_key = scalar_key(Namespace::Id, "old");
        let new_key = scalar_key(Namespace::Id, "new");
        let event = MutationEvent::new(
            MutationKind::Update,
            Some(json!({"_id": "old"})),
            Some(json!({"_id": "new"})),
        );
        let victims = engine.keys_to_invalidate(&[previous_key, new_key], &event);
        assert_eq!(victims.len(), 2);
    }

    #[test]
    fn update_invalidates_history_and_since_for_the_previous_id() {
        let engine = InvalidationEngine::new();
        let history_key = scalar_key(Namespace::History, "old");
        let since_key = scalar_key(Namespace::Since, "old");
        let event = MutationEvent::new(
            MutationKind::Update,
            Some(json!({"_id": "old"})),
            Some(json!({"_id": "new"})),
        );
        let victims = engine.keys_to_invalidate(&[history_key, since_key], &event);
        assert_eq!(victims.len(), 2);
    }

    #[test]
    fn update_invalidates_history_and_since_for_the_extracted_prime_and_previous_pointers() {
        let engine = InvalidationEngine::new();
        let root_history_key = scalar_key(Namespace::History, "root-doc");
        let after = json!({
            "_id": "new",
            "__rerum": { "history": { "previous": "http://e/id/old", "prime": "http://e/id/root-doc" } }
        });
        let event = MutationEvent::new(MutationKind::Update, Some(json!({"_id": "old"})), Some(after));
        let victims = engine.keys_to_invalidate(&[root_history_key], &event);
        assert_eq!(victims.len(), 1);
    }

    #[test]
    fn overwrite_invalidates_only_the_single_id_with_no_history_or_since() {
        let engine = InvalidationEngine::new();
        let id_key = scalar_key(Namespace::Id, "x");
        let history_key = scalar_key(Namespace::History, "x");
        let event = MutationEvent::new(
            MutationKind::Overwrite,
            Some(json!({"_id": "x"})),
            Some(json!({"_id": "x"})),
        );
        assert_eq!(engine.keys_to_invalidate(&[id_key], &event).len(), 1);
        assert!(engine.keys_to_invalidate(&[history_key], &event).is_empty());
    }

    #[test]
    fn delete_invalidates_the_before_id_and_its_lineage_pointers() {
        let engine = InvalidationEngine::new();
        let id_key = scalar_key(Namespace::Id, "mid");
        let root_since_key = scalar_key(Namespace::Since, "root-doc");
        let before = json!({
            "_id": "mid",
            "__rerum": { "history": { "previous": "http://e/id/root-doc", "prime": "http://e/id/root-doc" } }
        });
        let event = MutationEvent::new(MutationKind::Delete, Some(before), None);
        assert_eq!(engine.keys_to_invalidate(&[id_key], &event).len(), 1);
        assert_eq!(engine.keys_to_invalidate(&[root_since_key], &event).len(), 1);
    }

    #[test]
    fn create_never_invalidates_a_scalar_id_key() {
        let engine = InvalidationEngine::new();
        let id_key = scalar_key(Namespace::Id, "new");
        let event = MutationEvent::new(MutationKind::Create, None, Some(json!({"_id": "new"})));
        assert!(engine.keys_to_invalidate(&[id_key], &event).is_empty());
    }
}
