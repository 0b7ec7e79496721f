use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;

use crate::error::{AuthError, AuthErrorCode};
use crate::traits::KeyResolver;
use crate::types::KeyId;

/// In-memory key set, keyed by `kid`.
///
/// Useful when the provider keys are fetched out of band (or in tests).
/// Cloning is cheap; the keys are shared.
#[derive(Clone, Default)]
pub struct StaticKeyResolver {
    keys: Arc<HashMap<KeyId, DecodingKey>>,
}

impl StaticKeyResolver {
    /// Empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key under the given id.
    #[must_use]
    pub fn with_key(mut self, kid: impl Into<KeyId>, key: DecodingKey) -> Self {
        Arc::make_mut(&mut self.keys).insert(kid.into(), key);
        self
    }

    /// Add an RSA public key in PEM form.
    ///
    /// # Errors
    ///
    /// Returns [`AuthErrorCode::InvalidArgument`] if the PEM cannot be parsed.
    pub fn with_rsa_pem(self, kid: impl Into<KeyId>, pem: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            AuthError::with_message(AuthErrorCode::InvalidArgument, format!("invalid RSA key: {e}"))
        })?;
        Ok(self.with_key(kid, key))
    }

    /// Build from a JWK set document (e.g. the provider's published keys).
    ///
    /// Keys without a `kid` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthErrorCode::InvalidArgument`] if a key cannot be converted.
    pub fn from_jwk_set(set: &JwkSet) -> Result<Self, AuthError> {
        let mut keys = HashMap::with_capacity(set.keys.len());
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                continue;
            };
            let key = DecodingKey::from_jwk(jwk).map_err(|e| {
                AuthError::with_message(
                    AuthErrorCode::InvalidArgument,
                    format!("invalid JWK {kid}: {e}"),
                )
            })?;
            keys.insert(KeyId::from(kid), key);
        }
        Ok(Self {
            keys: Arc::new(keys),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, kid: &KeyId) -> Result<DecodingKey, AuthError> {
        self.keys.get(kid).cloned().ok_or_else(|| {
            AuthError::with_message(
                AuthErrorCode::NoMatchingKid,
                format!("no public key matches kid \"{kid}\""),
            )
        })
    }
}

impl std::fmt::Debug for StaticKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyResolver")
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
