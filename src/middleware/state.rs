use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::REFERER;

use super::config::{AuthConfig, AuthSettings};
use super::error::MiddlewareError;
use crate::auth::{Auth, VerifyOptions};
use crate::cookies::AuthCookieOptions;
use crate::traits::{KeyResolver, NoUserLookup, UserLookup};

/// Shared state for the auth routes and request layer.
///
/// Build once at startup and clone into every router that needs it.
pub struct AuthState<K, U = NoUserLookup> {
    pub(super) auth: Arc<Auth<K, U>>,
    pub(super) settings: Arc<AuthSettings>,
}

// Manual Clone: avoid derive adding `K: Clone, U: Clone` bounds.
impl<K, U> Clone for AuthState<K, U> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<K: KeyResolver> AuthState<K> {
    /// # Errors
    ///
    /// Returns [`MiddlewareError::Auth`] if the auth options are unusable.
    pub fn new(config: AuthConfig, keys: K) -> Result<Self, MiddlewareError> {
        let auth = Auth::new(config.options, keys)?;
        Ok(Self {
            auth: Arc::new(auth),
            settings: Arc::new(config.settings),
        })
    }
}

impl<K: KeyResolver, U: UserLookup> AuthState<K, U> {
    /// Wrap an already configured [`Auth`].
    #[must_use]
    pub fn from_auth(config: AuthConfig, auth: Auth<K, U>) -> Self {
        Self {
            auth: Arc::new(auth),
            settings: Arc::new(config.settings),
        }
    }

    /// The shared [`Auth`] instance.
    #[must_use]
    pub fn auth(&self) -> &Auth<K, U> {
        &self.auth
    }

    /// Cookie name, signing keys and attributes used for sessions.
    #[must_use]
    pub fn cookie_options(&self) -> &AuthCookieOptions {
        &self.settings.cookies
    }

    pub(super) fn verify_options(&self, headers: &HeaderMap) -> VerifyOptions {
        VerifyOptions {
            current_time: None,
            check_revoked: self.settings.check_revoked,
            referer: referer(headers),
            refresh_on_expired_kid: self.settings.refresh_on_expired_kid,
        }
    }

    pub(super) fn route(&self, name: &str) -> String {
        format!("{}/{name}", self.settings.auth_path.trim_end_matches('/'))
    }
}

pub(super) fn referer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
