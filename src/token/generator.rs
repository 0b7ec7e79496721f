use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use time::OffsetDateTime;

use crate::credential::ServiceAccount;
use crate::error::{AuthError, AuthErrorCode};

const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";
const CUSTOM_TOKEN_LIFETIME_SECS: i64 = 60 * 60;
const MAX_UID_LENGTH: usize = 128;

/// JWT claims the provider reserves; developer claims may not use them.
const RESERVED_CLAIMS: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "iat", "iss",
    "jti", "nbf", "nonce",
];

#[derive(Serialize)]
struct CustomTokenClaims<'a> {
    aud: &'static str,
    iat: i64,
    exp: i64,
    iss: &'a str,
    sub: &'a str,
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<&'a Map<String, JsonValue>>,
}

/// Mints custom tokens signed with a service account key.
pub struct CustomTokenGenerator {
    client_email: String,
    tenant_id: Option<String>,
    key: EncodingKey,
}

impl CustomTokenGenerator {
    /// # Errors
    ///
    /// Returns [`AuthErrorCode::InvalidArgument`] if the private key is not a valid RSA PEM.
    pub fn new(account: &ServiceAccount, tenant_id: Option<String>) -> Result<Self, AuthError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
            AuthError::with_message(
                AuthErrorCode::InvalidArgument,
                format!("service account private key is invalid: {e}"),
            )
        })?;
        Ok(Self {
            client_email: account.client_email.clone(),
            tenant_id,
            key,
        })
    }

    /// Mints a custom token for `uid`, valid for one hour.
    ///
    /// # Errors
    ///
    /// [`AuthErrorCode::InvalidArgument`] for a bad uid or reserved claim names.
    pub fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, JsonValue>>,
    ) -> Result<String, AuthError> {
        self.create_custom_token_at(uid, developer_claims, OffsetDateTime::now_utc())
    }

    pub(crate) fn create_custom_token_at(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, JsonValue>>,
        now: OffsetDateTime,
    ) -> Result<String, AuthError> {
        if uid.is_empty() || uid.chars().count() > MAX_UID_LENGTH {
            return Err(AuthError::with_message(
                AuthErrorCode::InvalidArgument,
                "`uid` must be a non-empty string with at most 128 characters",
            ));
        }

        if let Some(claims) = developer_claims {
            if let Some(reserved) = claims.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
                return Err(AuthError::with_message(
                    AuthErrorCode::InvalidArgument,
                    format!("developer claim \"{reserved}\" is reserved and cannot be specified"),
                ));
            }
        }

        let iat = now.unix_timestamp();
        let claims = CustomTokenClaims {
            aud: CUSTOM_TOKEN_AUDIENCE,
            iat,
            exp: iat + CUSTOM_TOKEN_LIFETIME_SECS,
            iss: &self.client_email,
            sub: &self.client_email,
            uid,
            tenant_id: self.tenant_id.as_deref(),
            claims: developer_claims.filter(|c| !c.is_empty()),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key).map_err(|e| {
            AuthError::with_message(
                AuthErrorCode::InternalError,
                format!("signing custom token failed: {e}"),
            )
        })
    }
}

impl std::fmt::Debug for CustomTokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTokenGenerator")
            .field("client_email", &self.client_email)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}
