//! Typed-error to HTTP-response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;
use crate::versioning::VersioningError;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Versioning(#[from] VersioningError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl HttpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::Auth(e) => auth_status(e),
            HttpError::Versioning(e) => versioning_status(e),
            HttpError::Store(e) => store_status(e),
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        // The token decoded and validated fine but carries no agent
        // claim to authorize the write as — a forbidden request, not
        // an unauthenticated one.
        AuthError::MissingAgentClaim => StatusCode::FORBIDDEN,
        AuthError::MissingHeader | AuthError::MalformedHeader | AuthError::InvalidToken(_) => {
            StatusCode::UNAUTHORIZED
        }
    }
}

fn versioning_status(err: &VersioningError) -> StatusCode {
    match err {
        VersioningError::NotFound(_) => StatusCode::NOT_FOUND,
        VersioningError::SlugConflict(_) => StatusCode::CONFLICT,
        VersioningError::Forbidden => StatusCode::FORBIDDEN,
        VersioningError::VersionMismatch { .. } => StatusCode::CONFLICT,
        VersioningError::PatchIntroducedNewFields(_) => StatusCode::BAD_REQUEST,
        VersioningError::CorruptMetadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        VersioningError::Store(e) => store_status(e),
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Optimistic-locking conflicts echo the current version so the
        // caller can retry with an up-to-date precondition.
        if let HttpError::Versioning(VersioningError::VersionMismatch { got, .. }) = &self {
            return (status, Json(json!({ "error": self.to_string(), "currentVersion": got }))).into_response();
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
