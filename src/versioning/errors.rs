use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersioningError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("slug already in use: {0}")]
    SlugConflict(String),

    #[error("caller's agent does not match the document's generatedBy")]
    Forbidden,

    #[error("overwrite version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: String, got: String },

    #[error("patch payload introduced new field(s): {0:?}")]
    PatchIntroducedNewFields(Vec<String>),

    #[error("document is missing or has a malformed __rerum block: {0}")]
    CorruptMetadata(String),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
