use async_trait::async_trait;
use serde_json::Value;

use super::errors::StoreError;

/// A single sort key: field path plus direction (`1` ascending, `-1`
/// descending), mirroring the wire convention used by `search`/`query`
/// route parameters.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

/// The document-store collaborator. Every method speaks in terms of
/// already-parsed `Value` documents and predicate trees built in
/// [`crate::keys`]; the concrete backend is free to translate those
/// however its query language requires.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_one(&self, doc: Value) -> Result<Value, StoreError>;

    async fn find_one(&self, id: &str) -> Result<Option<Value>, StoreError>;

    async fn find(
        &self,
        filter: &Value,
        limit: u64,
        skip: u64,
        sort: &[SortKey],
    ) -> Result<Vec<Value>, StoreError>;

    /// Full-text search over indexed fields, distinct from `find`'s
    /// structured-predicate matching.
    async fn search(
        &self,
        text: &str,
        phrase: bool,
        limit: u64,
        skip: u64,
    ) -> Result<Vec<Value>, StoreError>;

    async fn update_one(&self, id: &str, doc: Value) -> Result<Value, StoreError>;

    async fn delete_one(&self, id: &str) -> Result<(), StoreError>;
}
