use std::convert::Infallible;
use std::ops::Deref;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use super::error::MiddlewareError;
use crate::types::VerifiedTokens;

/// Session verified by [`auth_middleware`](super::auth_middleware).
///
/// Returns `401 Unauthorized` if the request has no verified session.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(AuthTokens(tokens): AuthTokens) -> impl IntoResponse {
///     format!("Hello, {}", tokens.decoded_id_token.uid())
/// }
///
/// // Optional: accessible to both authenticated and anonymous users
/// async fn home(tokens: Option<AuthTokens>) -> impl IntoResponse {
///     match tokens {
///         Some(t) => format!("Hello, {}", t.uid()),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthTokens(pub VerifiedTokens);

impl AuthTokens {
    /// Uid of the session user.
    #[must_use]
    pub fn uid(&self) -> &str {
        self.0.decoded_id_token.uid()
    }
}

impl Deref for AuthTokens {
    type Target = VerifiedTokens;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthTokens {
    type Rejection = MiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedTokens>()
            .cloned()
            .map(Self)
            .ok_or(MiddlewareError::Unauthenticated)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthTokens {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<VerifiedTokens>().cloned().map(Self))
    }
}
