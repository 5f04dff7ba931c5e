use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("malformed Authorization header")]
    MalformedHeader,

    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("token is missing an agent claim")]
    MissingAgentClaim,
}
