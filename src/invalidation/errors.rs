use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("invalidation task did not complete within the barrier window")]
    Timeout,
}
