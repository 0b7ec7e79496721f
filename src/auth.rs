use std::future::Future;

use serde_json::{Value as JsonValue, json};
use time::OffsetDateTime;

use crate::credential::ServiceAccount;
use crate::error::{AuthError, AuthErrorCode, Error, InvalidTokenError, InvalidTokenReason};
use crate::exchange::{Endpoints, ExchangeOptions, TokenExchangeClient};
use crate::recovery::{self, Recovered, RecoveryPolicy};
use crate::token::{
    CustomTokenGenerator, DecodedIdToken, IdTokenVerifier, ensure_not_revoked_or_disabled,
    filter_standard_claims,
};
use crate::traits::{KeyResolver, NoUserLookup, UserLookup};
use crate::types::{AnonymousTokens, CustomTokens, ParsedTokens, VerifiedTokens};

/// Project-level settings for [`Auth`].
///
/// Required fields are constructor parameters; the rest chain with `with_*`.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthOptions {
    pub(crate) project_id: String,
    pub(crate) api_key: String,
    pub(crate) service_account: Option<ServiceAccount>,
    pub(crate) tenant_id: Option<String>,
    pub(crate) enable_custom_token: bool,
    pub(crate) emulator_host: Option<String>,
}

impl AuthOptions {
    /// Options for `project_id`, calling the provider with the web `api_key`.
    #[must_use]
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            service_account: None,
            tenant_id: None,
            enable_custom_token: false,
            emulator_host: None,
        }
    }

    /// Service account used to mint custom tokens.
    #[must_use]
    pub fn with_service_account(mut self, account: ServiceAccount) -> Self {
        self.service_account = Some(account);
        self
    }

    /// Only accept ID tokens issued for this tenant, and sign in within it.
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Mint a fresh custom token on every refresh and keep it in the session.
    #[must_use]
    pub fn with_custom_token_enabled(mut self, enabled: bool) -> Self {
        self.enable_custom_token = enabled;
        self
    }

    /// Route provider calls through an auth emulator at `host`.
    #[must_use]
    pub fn with_emulator_host(mut self, host: impl Into<String>) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    /// Expected `aud` of verified ID tokens.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Web API key sent as `key` on provider calls.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Tenant sessions are scoped to, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

/// Per-call verification settings.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Clock used for time-based claims; defaults to now.
    pub current_time: Option<OffsetDateTime>,
    /// Look up the user and reject disabled users or revoked sessions.
    pub check_revoked: bool,
    /// Forwarded as `Referer` on provider calls.
    pub referer: Option<String>,
    /// See [`RecoveryPolicy::refresh_on_expired_kid`].
    pub refresh_on_expired_kid: bool,
}

impl VerifyOptions {
    /// Verify as of `time` instead of now.
    #[must_use]
    pub fn with_current_time(mut self, time: OffsetDateTime) -> Self {
        self.current_time = Some(time);
        self
    }

    /// Enable the disabled-user and revoked-session check.
    #[must_use]
    pub fn with_check_revoked(mut self, check: bool) -> Self {
        self.check_revoked = check;
        self
    }

    /// Forward `referer` on the refresh exchange.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Treat an unknown signing key as expiry and attempt a refresh.
    #[must_use]
    pub fn with_refresh_on_expired_kid(mut self, enabled: bool) -> Self {
        self.refresh_on_expired_kid = enabled;
        self
    }

    fn policy(&self) -> RecoveryPolicy {
        RecoveryPolicy {
            refresh_on_expired_kid: self.refresh_on_expired_kid,
        }
    }
}

/// Options for [`Auth::get_custom_id_and_refresh_tokens`].
#[derive(Debug, Clone, Default)]
pub struct CustomTokensOptions {
    pub app_check_token: Option<String>,
    pub referer: Option<String>,
    /// Claims to leave out of the minted custom token.
    pub dynamic_custom_claims_keys: Vec<String>,
}

/// Entry point: verifies, refreshes and mints tokens for one project.
///
/// Holds only read-only configuration, so one instance can be shared by
/// every request.
pub struct Auth<K, U = NoUserLookup> {
    verifier: IdTokenVerifier<K>,
    exchange: TokenExchangeClient,
    generator: Option<CustomTokenGenerator>,
    users: U,
    tenant_id: Option<String>,
    enable_custom_token: bool,
}

impl<K: KeyResolver> Auth<K> {
    /// # Errors
    ///
    /// [`Error::Config`] for a bad emulator host, or [`Error::Auth`] if the
    /// service account key cannot be loaded.
    pub fn new(options: AuthOptions, keys: K) -> Result<Self, Error> {
        let endpoints = Endpoints::resolve(options.emulator_host.as_deref())?;

        let mut verifier = IdTokenVerifier::new(options.project_id, keys);
        if let Some(tenant_id) = &options.tenant_id {
            verifier = verifier.with_tenant_id(tenant_id.clone());
        }

        let generator = options
            .service_account
            .as_ref()
            .map(|account| CustomTokenGenerator::new(account, options.tenant_id.clone()))
            .transpose()?;

        Ok(Self {
            verifier,
            exchange: TokenExchangeClient::new(options.api_key, endpoints),
            generator,
            users: NoUserLookup,
            tenant_id: options.tenant_id,
            enable_custom_token: options.enable_custom_token,
        })
    }
}

impl<K: KeyResolver, U: UserLookup> Auth<K, U> {
    /// Use `users` for revocation checks.
    #[must_use]
    pub fn with_user_lookup<L: UserLookup>(self, users: L) -> Auth<K, L> {
        Auth {
            verifier: self.verifier,
            exchange: self.exchange,
            generator: self.generator,
            users,
            tenant_id: self.tenant_id,
            enable_custom_token: self.enable_custom_token,
        }
    }

    /// Use a custom HTTP client for provider calls.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.exchange = self.exchange.with_http_client(client);
        self
    }

    /// Client used for the provider's token endpoints.
    #[must_use]
    pub fn exchange_client(&self) -> &TokenExchangeClient {
        &self.exchange
    }

    /// Whether sessions carry a custom token.
    #[must_use]
    pub fn custom_token_enabled(&self) -> bool {
        self.enable_custom_token
    }

    /// Verifies an ID token; checks revocation only when asked to.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from verification or the revocation check.
    pub async fn verify_id_token(
        &self,
        id_token: &str,
        options: &VerifyOptions,
    ) -> Result<DecodedIdToken, AuthError> {
        let now = options.current_time.unwrap_or_else(OffsetDateTime::now_utc);
        let decoded = self.verifier.verify(id_token, now).await?;

        if options.check_revoked {
            ensure_not_revoked_or_disabled(&decoded, &self.users).await?;
        }

        Ok(decoded)
    }

    /// Exchanges a refresh token and verifies the new ID token.
    ///
    /// The new token is verified exactly once; a failure here is final.
    ///
    /// # Errors
    ///
    /// Exchange, verification or custom token errors.
    pub async fn handle_token_refresh(
        &self,
        refresh_token: &str,
        options: &VerifyOptions,
    ) -> Result<VerifiedTokens, Error> {
        let pair = self
            .exchange
            .exchange_refresh_token(refresh_token, options.referer.as_deref())
            .await?;

        let decoded_id_token = self.verify_id_token(&pair.id_token, options).await?;

        let custom_token = if self.enable_custom_token {
            Some(self.mint_session_custom_token(&decoded_id_token, None)?)
        } else {
            None
        };

        Ok(VerifiedTokens {
            decoded_id_token,
            id_token: pair.id_token,
            refresh_token: Some(pair.refresh_token),
            custom_token,
        })
    }

    /// Verifies session tokens, refreshing them once if they expired.
    ///
    /// # Errors
    ///
    /// The terminal [`InvalidTokenError`]; the wrapped code tells why.
    pub async fn verify_and_refresh_expired_id_token(
        &self,
        tokens: &ParsedTokens,
        options: &VerifyOptions,
    ) -> Result<Recovered, InvalidTokenError> {
        self.verify_and_refresh_expired_id_token_with(tokens, options, |_| async { Ok(()) })
            .await
    }

    /// Like [`verify_and_refresh_expired_id_token`](Self::verify_and_refresh_expired_id_token),
    /// calling `on_token_refresh` once with the new session before returning it.
    ///
    /// # Errors
    ///
    /// The terminal [`InvalidTokenError`]. A failing callback fails the call.
    pub async fn verify_and_refresh_expired_id_token_with<F, Fut>(
        &self,
        tokens: &ParsedTokens,
        options: &VerifyOptions,
        on_token_refresh: F,
    ) -> Result<Recovered, InvalidTokenError>
    where
        F: FnOnce(VerifiedTokens) -> Fut,
        Fut: Future<Output = Result<(), Error>>,
    {
        recovery::handle_expired_token(
            self.verify_id_token(&tokens.id_token, options),
            |_trigger| async move {
                let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
                    InvalidTokenError::new(InvalidTokenReason::MissingRefreshToken)
                })?;
                let refreshed = self.handle_token_refresh(refresh_token, options).await?;
                on_token_refresh(refreshed.clone()).await?;
                Ok::<_, Error>(refreshed)
            },
            |decoded_id_token| VerifiedTokens {
                decoded_id_token,
                id_token: tokens.id_token.clone(),
                refresh_token: tokens.refresh_token.clone(),
                custom_token: tokens.custom_token.clone(),
            },
            options.policy(),
        )
        .await
    }

    /// Mints a custom token for `uid`.
    ///
    /// # Errors
    ///
    /// [`AuthErrorCode::InvalidArgument`] if no service account is configured
    /// or the uid or claims are invalid.
    pub fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&serde_json::Map<String, JsonValue>>,
    ) -> Result<String, AuthError> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            AuthError::with_message(
                AuthErrorCode::InvalidArgument,
                "a service account is required to mint custom tokens",
            )
        })?;
        generator.create_custom_token(uid, developer_claims)
    }

    /// Verifies `id_token`, mints a custom token carrying its developer
    /// claims, and exchanges it for a fresh token pair.
    ///
    /// # Errors
    ///
    /// Verification, minting or exchange errors.
    pub async fn get_custom_id_and_refresh_tokens(
        &self,
        id_token: &str,
        options: &CustomTokensOptions,
    ) -> Result<CustomTokens, Error> {
        let verify_options = VerifyOptions {
            referer: options.referer.clone(),
            ..VerifyOptions::default()
        };
        let decoded = self.verify_id_token(id_token, &verify_options).await?;

        let mut claims = filter_standard_claims(&decoded);
        for key in &options.dynamic_custom_claims_keys {
            claims.remove(key);
        }
        let custom_token = self.mint_session_custom_token(&decoded, Some(claims))?;
        tracing::debug!(uid = %decoded.sub, "Generated custom token from ID token");

        let exchange_options = ExchangeOptions {
            tenant_id: self.tenant_id.clone(),
            app_check_token: options.app_check_token.clone(),
            referer: options.referer.clone(),
        };
        let pair = self
            .exchange
            .exchange_custom_token(&custom_token, &exchange_options)
            .await?;

        Ok(CustomTokens {
            id_token: pair.id_token,
            refresh_token: pair.refresh_token,
            custom_token,
        })
    }

    /// Creates an anonymous account.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with the raw provider body if sign-up is
    /// rejected, or [`Error::Http`] on network failure.
    pub async fn create_anonymous_user(
        &self,
        options: &ExchangeOptions,
    ) -> Result<AnonymousTokens, Error> {
        self.exchange.create_anonymous_account(options).await
    }

    fn mint_session_custom_token(
        &self,
        decoded: &DecodedIdToken,
        claims: Option<serde_json::Map<String, JsonValue>>,
    ) -> Result<String, AuthError> {
        let mut claims = claims.unwrap_or_default();
        if let Some(email_verified) = decoded.email_verified {
            claims.insert("email_verified".into(), json!(email_verified));
        }
        claims.insert(
            "source_sign_in_provider".into(),
            json!(decoded.firebase.sign_in_provider),
        );
        self.create_custom_token(decoded.uid(), Some(&claims))
    }
}
