use cookie::SameSite;

use super::error::MiddlewareError;
use crate::auth::AuthOptions;
use crate::cookies::{AuthCookieOptions, CookieOptions, SigningKeys};
use crate::credential::ServiceAccount;

/// Cookie and route settings shared by config and runtime state.
#[derive(Debug, Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookies: AuthCookieOptions,
    pub(crate) auth_path: String,
    pub(crate) check_revoked: bool,
    pub(crate) refresh_on_expired_kid: bool,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookies: AuthCookieOptions::new("AuthToken", SigningKeys::generate()),
            auth_path: "/api".into(),
            check_revoked: false,
            refresh_on_expired_kid: false,
        }
    }
}

/// Middleware configuration.
///
/// Required settings (`AuthOptions`) are a constructor parameter. Use
/// [`from_env()`](AuthConfig::from_env) for convention-based setup, or
/// [`new()`](AuthConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub(super) options: AuthOptions,
    pub(super) settings: AuthSettings,
}

impl AuthConfig {
    /// Config with default cookie settings and an ephemeral signing key.
    #[must_use]
    pub fn new(options: AuthOptions) -> Self {
        Self {
            options,
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `FIREBASE_PROJECT_ID`
    /// - `FIREBASE_API_KEY`: web API key for the token endpoints
    ///
    /// # Optional env vars
    /// - `FIREBASE_CLIENT_EMAIL` + `FIREBASE_PRIVATE_KEY`: service account for custom tokens
    /// - `FIREBASE_TENANT_ID`
    /// - `FIREBASE_AUTH_EMULATOR_HOST`: e.g. `127.0.0.1:9099`
    /// - `AUTH_COOKIE_NAME`
    /// - `AUTH_COOKIE_SIGNATURE_KEYS`: comma-separated, newest first
    /// - `AUTH_SECURE_COOKIES`: `"0"` or `"false"` to drop the `Secure` attribute
    /// - `AUTH_ENABLE_CUSTOM_TOKEN`: `"1"` or `"true"`
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareError::Config`] if required env vars are missing.
    pub fn from_env() -> Result<Self, MiddlewareError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(var: F) -> Result<Self, MiddlewareError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_id = var("FIREBASE_PROJECT_ID")
            .ok_or_else(|| MiddlewareError::Config("FIREBASE_PROJECT_ID is required".into()))?;
        let api_key = var("FIREBASE_API_KEY")
            .ok_or_else(|| MiddlewareError::Config("FIREBASE_API_KEY is required".into()))?;

        let mut options = AuthOptions::new(project_id.clone(), api_key)
            .with_custom_token_enabled(is_truthy(var("AUTH_ENABLE_CUSTOM_TOKEN").as_deref()));

        match (var("FIREBASE_CLIENT_EMAIL"), var("FIREBASE_PRIVATE_KEY")) {
            (Some(email), Some(key)) => {
                options = options.with_service_account(ServiceAccount::new(project_id, email, key));
            }
            (None, None) => {}
            _ => {
                return Err(MiddlewareError::Config(
                    "FIREBASE_CLIENT_EMAIL and FIREBASE_PRIVATE_KEY must be set together".into(),
                ));
            }
        }
        if let Some(tenant_id) = var("FIREBASE_TENANT_ID") {
            options = options.with_tenant_id(tenant_id);
        }
        if let Some(host) = var("FIREBASE_AUTH_EMULATOR_HOST") {
            options = options.with_emulator_host(host);
        }

        let mut config = Self::new(options);

        if let Some(name) = var("AUTH_COOKIE_NAME") {
            config = config.with_cookie_name(name);
        }

        let keys = match var("AUTH_COOKIE_SIGNATURE_KEYS") {
            Some(keys) => SigningKeys::new(keys.split(',').map(str::trim))
                .map_err(|e| MiddlewareError::Config(format!("AUTH_COOKIE_SIGNATURE_KEYS: {e}")))?,
            None => {
                tracing::warn!(
                    "AUTH_COOKIE_SIGNATURE_KEYS is not set; using an ephemeral key, sessions will not survive a restart"
                );
                SigningKeys::generate()
            }
        };

        let secure = !matches!(var("AUTH_SECURE_COOKIES").as_deref(), Some("0" | "false"));

        Ok(config.with_signature_keys(keys).with_secure_cookies(secure))
    }

    /// Project-level auth options.
    #[must_use]
    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Session cookie settings.
    #[must_use]
    pub fn cookie_options(&self) -> &AuthCookieOptions {
        &self.settings.cookies
    }

    /// Set the session cookie name (the signature cookie is `<name>.sig`).
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.cookies.cookie_name = name.into();
        self
    }

    /// Set the cookie signing keys, newest first.
    #[must_use]
    pub fn with_signature_keys(mut self, keys: SigningKeys) -> Self {
        self.settings.cookies.signature_keys = keys;
        self
    }

    /// Replace all session cookie attributes.
    #[must_use]
    pub fn with_cookie_serialize_options(mut self, options: CookieOptions) -> Self {
        self.settings.cookies.serialize = options;
        self
    }

    /// Set the `Secure` attribute (disable for local HTTP development).
    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.cookies.serialize.secure = secure;
        self
    }

    /// Set the `SameSite` attribute.
    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.settings.cookies.serialize.same_site = same_site;
        self
    }

    /// Prefix of the login, logout and refresh routes.
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Reject sessions of disabled users or revoked tokens on every request.
    ///
    /// Requires a [`UserLookup`](crate::UserLookup) on the state.
    #[must_use]
    pub fn with_check_revoked(mut self, check: bool) -> Self {
        self.settings.check_revoked = check;
        self
    }

    /// Refresh sessions whose signing key was rotated out.
    #[must_use]
    pub fn with_refresh_on_expired_kid(mut self, enabled: bool) -> Self {
        self.settings.refresh_on_expired_kid = enabled;
        self
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true"))
}
