//! Reference in-memory `DocumentStore`, used by tests and by the CLI
//! when no external backend is configured.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::keys::{evaluate, parse_predicate};

use super::errors::StoreError;
use super::traits::{DocumentStore, SortKey};

#[derive(Default)]
pub struct InMemoryStore {
    documents: Mutex<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_one(&self, mut doc: Value) -> Result<Value, StoreError> {
        let id = doc
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("_id".to_string(), Value::String(id.clone()));
        }
        self.documents.lock().expect("store mutex poisoned").insert(id, doc.clone());
        Ok(doc)
    }

    async fn find_one(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.lock().expect("store mutex poisoned").get(id).cloned())
    }

    async fn find(
        &self,
        filter: &Value,
        limit: u64,
        skip: u64,
        sort: &[SortKey],
    ) -> Result<Vec<Value>, StoreError> {
        let conditions = parse_predicate(filter);
        let guard = self.documents.lock().expect("store mutex poisoned");
        let mut matched: Vec<Value> = guard.values().filter(|doc| evaluate(doc, &conditions)).cloned().collect();
        drop(guard);

        sort_documents(&mut matched, sort);
        Ok(paginate(matched, limit, skip))
    }

    async fn search(&self, text: &str, phrase: bool, limit: u64, skip: u64) -> Result<Vec<Value>, StoreError> {
        let needle = text.to_lowercase();
        let terms: Vec<&str> = needle.split_whitespace().collect();
        let guard = self.documents.lock().expect("store mutex poisoned");
        let matched: Vec<Value> = guard
            .values()
            .filter(|doc| {
                let haystack = flatten_to_text(doc).to_lowercase();
                if phrase {
                    haystack.contains(&needle)
                } else {
                    terms.iter().all(|term| haystack.contains(term))
                }
            })
            .cloned()
            .collect();
        drop(guard);
        Ok(paginate(matched, limit, skip))
    }

    async fn update_one(&self, id: &str, doc: Value) -> Result<Value, StoreError> {
        let mut guard = self.documents.lock().expect("store mutex poisoned");
        if !guard.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        guard.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    async fn delete_one(&self, id: &str) -> Result<(), StoreError> {
        let mut guard = self.documents.lock().expect("store mutex poisoned");
        guard.remove(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(())
    }
}

fn sort_documents(docs: &mut [Value], sort: &[SortKey]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in sort {
            let av = a.get(&key.field);
            let bv = b.get(&key.field);
            let ordering = compare_optional(av, bv);
            let ordering = if key.ascending { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn paginate(docs: Vec<Value>, limit: u64, skip: u64) -> Vec<Value> {
    let skip = skip as usize;
    let iter = docs.into_iter().skip(skip);
    if limit == 0 {
        iter.collect()
    } else {
        iter.take(limit as usize).collect()
    }
}

fn flatten_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map.values().map(flatten_to_text).collect::<Vec<_>>().join(" "),
        Value::Array(items) => items.iter().map(flatten_to_text).collect::<Vec<_>>().join(" "),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_find_one_round_trips() {
        let store = InMemoryStore::new();
        let inserted = store.insert_one(json!({"_id": "d1", "type": "A"})).await.unwrap();
        assert_eq!(inserted["_id"], "d1");
        let found = store.find_one("d1").await.unwrap();
        assert_eq!(found.unwrap()["type"], "A");
    }

    #[tokio::test]
    async fn insert_without_id_generates_one() {
        let store = InMemoryStore::new();
        let inserted = store.insert_one(json!({"type": "A"})).await.unwrap();
        assert!(inserted["_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn find_applies_predicate_and_pagination() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.insert_one(json!({"_id": format!("d{i}"), "type": "A", "n": i})).await.unwrap();
        }
        store.insert_one(json!({"_id": "other", "type": "B", "n": 0})).await.unwrap();

        let results = store.find(&json!({"type": "A"}), 2, 1, &[]).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|d| d["type"] == "A"));
    }

    #[tokio::test]
    async fn update_one_fails_for_missing_document() {
        let store = InMemoryStore::new();
        let result = store.update_one("missing", json!({"_id": "missing"})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = InMemoryStore::new();
        store.insert_one(json!({"_id": "d1"})).await.unwrap();
        store.delete_one("d1").await.unwrap();
        assert!(store.find_one("d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_matches_phrase_and_terms() {
        let store = InMemoryStore::new();
        store.insert_one(json!({"_id": "d1", "body": {"label": "hello world"}})).await.unwrap();
        store.insert_one(json!({"_id": "d2", "body": {"label": "goodbye"}})).await.unwrap();

        let phrase_hits = store.search("hello world", true, 0, 0).await.unwrap();
        assert_eq!(phrase_hits.len(), 1);

        let term_hits = store.search("world hello", false, 0, 0).await.unwrap();
        assert_eq!(term_hits.len(), 1);
    }
}
