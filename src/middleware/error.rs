use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{Error, InvalidTokenError};

/// Errors surfaced by the middleware routes and extractors.
#[derive(Debug, thiserror::Error)]
pub enum MiddlewareError {
    /// No verified session on the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Session cookies or bearer token did not verify.
    #[error(transparent)]
    InvalidToken(#[from] InvalidTokenError),

    /// Verification, exchange or cookie failure.
    #[error(transparent)]
    Auth(#[from] Error),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MiddlewareError {
    fn is_client_error(&self) -> bool {
        match self {
            Self::Unauthenticated | Self::InvalidToken(_) => true,
            Self::Auth(e) => {
                e.auth_code().is_some()
                    || matches!(
                        e,
                        Error::InvalidSignature | Error::MissingCookie(_) | Error::Provider { .. }
                    )
            }
            Self::Config(_) => false,
        }
    }

    fn code(&self) -> String {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED".into(),
            Self::InvalidToken(e) => e.reason().to_string(),
            Self::Auth(e) => e
                .auth_code()
                .map_or_else(|| "INVALID_CREDENTIALS".into(), |code| code.to_string()),
            Self::Config(_) => "INTERNAL_ERROR".into(),
        }
    }
}

impl IntoResponse for MiddlewareError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::debug!(error = %self, "Request not authenticated");
            let body = json!({ "error": self.code(), "message": self.to_string() });
            return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        }

        tracing::error!(error = %self, "Auth internal error");
        let body = json!({ "error": "INTERNAL_ERROR", "message": "Internal error" });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<crate::error::AuthError> for MiddlewareError {
    fn from(e: crate::error::AuthError) -> Self {
        Self::Auth(e.into())
    }
}
