use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::models::AuthLevel;

/// DispatchError
///
/// Every failure the dispatcher can produce. None of these leave the dispatch boundary
/// as anything other than an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No default handlers found for App Server.")]
    NoDefaultHandler,

    #[error("no default template handler registered for missing template {0}")]
    NoDefaultTemplate(String),

    #[error("forbidden: requires {required:?}, caller has {actual:?}")]
    Forbidden { required: AuthLevel, actual: AuthLevel },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Template error: {0}")]
    Render(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoDefaultHandler => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::NoDefaultTemplate(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Forbidden { .. } => StatusCode::FORBIDDEN,
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            warn!(error = %self, "dispatch failed");
        } else {
            debug!(error = %self, "dispatch rejected");
        }

        // Denials carry no body; server errors carry the diagnostic text.
        match self {
            DispatchError::Forbidden { .. } | DispatchError::NotFound(_) => status.into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}
