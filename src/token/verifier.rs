use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use super::claims::DecodedIdToken;
use crate::error::{AuthError, AuthErrorCode};
use crate::traits::{KeyResolver, UserLookup};
use crate::types::{KeyId, Uid};

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const MAX_UID_LENGTH: usize = 128;
/// Tolerated drift between the provider's clock and ours for `iat` and `auth_time`.
const CLOCK_SKEW_SECONDS: i64 = 300;

/// Verifies Firebase ID tokens against a project (and optional tenant).
///
/// Verification is a pure function of the token, the resolved key and the
/// supplied clock; nothing is cached between calls.
pub struct IdTokenVerifier<K> {
    project_id: String,
    issuer: String,
    tenant_id: Option<String>,
    keys: K,
}

impl<K: KeyResolver> IdTokenVerifier<K> {
    #[must_use]
    pub fn new(project_id: impl Into<String>, keys: K) -> Self {
        let project_id = project_id.into();
        Self {
            issuer: format!("{ISSUER_PREFIX}{project_id}"),
            project_id,
            tenant_id: None,
            keys,
        }
    }

    /// Only accept tokens issued for this tenant.
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Expected `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected `aud` claim.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.project_id
    }

    /// Verifies structure, signature and claims of `token` at instant `now`.
    ///
    /// # Errors
    ///
    /// - [`AuthErrorCode::InvalidArgument`] if the token is malformed
    /// - [`AuthErrorCode::NoMatchingKid`] if the signing key is unknown
    /// - [`AuthErrorCode::InvalidCredential`] on a bad signature or claim
    /// - [`AuthErrorCode::TokenExpired`] if `exp` is not after `now`
    pub async fn verify(&self, token: &str, now: OffsetDateTime) -> Result<DecodedIdToken, AuthError> {
        let header = jsonwebtoken::decode_header(token).map_err(|e| {
            AuthError::with_message(
                AuthErrorCode::InvalidArgument,
                format!("decoding ID token failed: {e}"),
            )
        })?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::with_message(
                AuthErrorCode::InvalidArgument,
                format!("ID token has incorrect algorithm: expected RS256, got {:?}", header.alg),
            ));
        }

        let kid = header.kid.map(KeyId).ok_or_else(|| {
            AuthError::with_message(AuthErrorCode::InvalidArgument, "ID token has no \"kid\" claim")
        })?;

        let key = self.keys.resolve(&kid).await?;

        // Time-based claims are checked below against the caller's clock.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<JsonValue>(token, &key, &validation)
            .map_err(map_jwt_error)?;

        self.validate_claims(data.claims, now)
    }

    fn validate_claims(&self, claims: JsonValue, now: OffsetDateTime) -> Result<DecodedIdToken, AuthError> {
        let decoded: DecodedIdToken = serde_json::from_value(claims).map_err(|e| {
            invalid_credential(format!("ID token has missing or malformed claims: {e}"))
        })?;
        let now = now.unix_timestamp();

        if decoded.exp <= now {
            return Err(AuthError::with_message(
                AuthErrorCode::TokenExpired,
                format!("ID token has expired at {}", decoded.exp),
            ));
        }
        if decoded.iat > now + CLOCK_SKEW_SECONDS {
            return Err(invalid_credential("ID token has \"iat\" claim in the future"));
        }
        if decoded.auth_time > now + CLOCK_SKEW_SECONDS {
            return Err(invalid_credential("ID token has \"auth_time\" claim in the future"));
        }
        if decoded.aud != self.project_id {
            return Err(invalid_credential(format!(
                "ID token has incorrect \"aud\" claim: expected '{}', got '{}'",
                self.project_id, decoded.aud
            )));
        }
        if decoded.iss != self.issuer {
            return Err(invalid_credential(format!(
                "ID token has incorrect \"iss\" claim: expected '{}', got '{}'",
                self.issuer, decoded.iss
            )));
        }
        if decoded.sub.is_empty() {
            return Err(invalid_credential("ID token has an empty \"sub\" claim"));
        }
        if decoded.sub.len() > MAX_UID_LENGTH {
            return Err(invalid_credential(
                "ID token has \"sub\" claim longer than 128 characters",
            ));
        }
        if let Some(expected) = &self.tenant_id {
            if decoded.firebase.tenant.as_deref() != Some(expected.as_str()) {
                return Err(invalid_credential(format!(
                    "ID token has incorrect tenant: expected '{expected}', got '{}'",
                    decoded.firebase.tenant.as_deref().unwrap_or("<none>")
                )));
            }
        }

        Ok(decoded)
    }
}

/// Fails if the token's user is missing, disabled, or revoked its sessions
/// after the token was authenticated.
///
/// # Errors
///
/// [`AuthErrorCode::UserNotFound`], [`AuthErrorCode::UserDisabled`] or
/// [`AuthErrorCode::TokenRevoked`]; lookup failures pass through.
pub async fn ensure_not_revoked_or_disabled<U: UserLookup>(
    decoded: &DecodedIdToken,
    users: &U,
) -> Result<(), AuthError> {
    let uid = Uid(decoded.sub.clone());
    let user = users
        .get_user(&uid)
        .await?
        .ok_or_else(|| AuthError::new(AuthErrorCode::UserNotFound))?;

    if user.disabled {
        return Err(AuthError::new(AuthErrorCode::UserDisabled));
    }

    if let Some(valid_after) = user.tokens_valid_after_time {
        let auth_time_ms = i128::from(decoded.auth_time) * 1_000;
        let valid_after_ms = valid_after.unix_timestamp_nanos() / 1_000_000;
        if auth_time_ms < valid_after_ms {
            return Err(AuthError::new(AuthErrorCode::TokenRevoked));
        }
    }

    Ok(())
}

fn invalid_credential(message: impl Into<String>) -> AuthError {
    AuthError::with_message(AuthErrorCode::InvalidCredential, message)
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::InvalidSignature => invalid_credential("ID token has invalid signature"),
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => AuthError::with_message(
            AuthErrorCode::InvalidArgument,
            format!("decoding ID token failed: {e}"),
        ),
        _ => invalid_credential(format!("ID token verification failed: {e}")),
    }
}
