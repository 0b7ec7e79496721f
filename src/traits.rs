use std::future::Future;

use jsonwebtoken::DecodingKey;

use crate::error::{AuthError, AuthErrorCode};
use crate::types::{KeyId, Uid, UserRecord};

/// Resolves a token's `kid` header to the provider public key that signed it.
///
/// Fetching and caching the provider key set is up to the implementor.
/// Unknown key ids must fail with [`AuthErrorCode::NoMatchingKid`].
///
/// # Example
///
/// ```rust,ignore
/// impl KeyResolver for MyJwksCache {
///     async fn resolve(&self, kid: &KeyId) -> Result<DecodingKey, AuthError> {
///         self.cached_key(kid)
///             .await
///             .ok_or_else(|| AuthError::new(AuthErrorCode::NoMatchingKid))
///     }
/// }
/// ```
pub trait KeyResolver: Send + Sync + 'static {
    fn resolve(
        &self,
        kid: &KeyId,
    ) -> impl Future<Output = Result<DecodingKey, AuthError>> + Send;
}

/// Consumer-provided user record lookup, used for revocation checks.
///
/// Return `Ok(None)` for unknown users. Backend failures should map to
/// [`AuthErrorCode::InternalError`].
pub trait UserLookup: Send + Sync + 'static {
    fn get_user(
        &self,
        uid: &Uid,
    ) -> impl Future<Output = Result<Option<UserRecord>, AuthError>> + Send;
}

/// Placeholder lookup for setups that never check revocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUserLookup;

impl UserLookup for NoUserLookup {
    async fn get_user(&self, _uid: &Uid) -> Result<Option<UserRecord>, AuthError> {
        Err(AuthError::with_message(
            AuthErrorCode::InternalError,
            "revocation check requested but no user lookup is configured",
        ))
    }
}
