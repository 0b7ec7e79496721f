//! Verify → refresh → re-verify flow for expired or key-rotated ID tokens.
//!
//! ```text
//! Verifying ─┬─ ok ─────────────────────────────▶ Valid
//!            ├─ TOKEN_EXPIRED ─────────────────▶ Refreshing
//!            ├─ NO_MATCHING_KID ─┬─ opt-in ────▶ Refreshing
//!            │                   └─────────────▶ Failed (INVALID_KID)
//!            └─ other ─────────────────────────▶ Failed (INVALID_CREDENTIALS)
//! Refreshing ─┬─ ok ───────────────────────────▶ Refreshed
//!             └─ err ──────────────────────────▶ Failed
//! ```
//!
//! Refreshing happens at most once per call.

use std::future::Future;

use crate::error::{AuthError, AuthErrorCode, Error, InvalidTokenError, InvalidTokenReason};
use crate::token::DecodedIdToken;
use crate::types::VerifiedTokens;

/// How far to go when trying to heal a failed verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Treat an unknown key id like an expired token and try a refresh.
    ///
    /// Unknown key ids usually mean the provider rotated its keys, so this
    /// is a heuristic and stays off by default.
    pub refresh_on_expired_kid: bool,
}

/// Result of the initial verification.
#[derive(Debug)]
pub enum Verification {
    Valid(DecodedIdToken),
    Expired(AuthError),
    KeyMismatch(AuthError),
    Invalid(AuthError),
}

impl Verification {
    #[must_use]
    pub fn classify(result: Result<DecodedIdToken, AuthError>) -> Self {
        match result {
            Ok(decoded) => Self::Valid(decoded),
            Err(e) => match e.code() {
                AuthErrorCode::TokenExpired => Self::Expired(e),
                AuthErrorCode::NoMatchingKid => Self::KeyMismatch(e),
                _ => Self::Invalid(e),
            },
        }
    }

    /// Next step under `policy`.
    #[must_use]
    pub fn next(self, policy: RecoveryPolicy) -> Transition {
        match self {
            Self::Valid(decoded) => Transition::Accept(decoded),
            Self::Expired(e) => Transition::Refresh(e),
            Self::KeyMismatch(e) if policy.refresh_on_expired_kid => Transition::Refresh(e),
            Self::KeyMismatch(e) | Self::Invalid(e) => Transition::Reject(reject(e)),
        }
    }
}

/// What to do after the initial verification.
#[derive(Debug)]
pub enum Transition {
    Accept(DecodedIdToken),
    /// Attempt a refresh; carries the error that triggered it.
    Refresh(AuthError),
    Reject(InvalidTokenError),
}

/// Terminal success state.
#[derive(Debug, Clone)]
pub enum Recovered {
    Valid(VerifiedTokens),
    Refreshed(VerifiedTokens),
}

impl Recovered {
    /// Whether the session was healed by a refresh.
    #[must_use]
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }

    /// The verified session.
    #[must_use]
    pub fn tokens(&self) -> &VerifiedTokens {
        match self {
            Self::Valid(tokens) | Self::Refreshed(tokens) => tokens,
        }
    }

    #[must_use]
    pub fn into_tokens(self) -> VerifiedTokens {
        match self {
            Self::Valid(tokens) | Self::Refreshed(tokens) => tokens,
        }
    }
}

/// Drives one pass of the state machine.
///
/// `verify` runs first; `refresh` runs only if the transition asks for it,
/// and never more than once. `on_valid` builds the session for the `Valid`
/// state from the decoded token.
///
/// # Errors
///
/// Returns the terminal [`InvalidTokenError`] for the `Failed` state.
pub async fn handle_expired_token<V, R, RFut>(
    verify: V,
    refresh: R,
    on_valid: impl FnOnce(DecodedIdToken) -> VerifiedTokens,
    policy: RecoveryPolicy,
) -> Result<Recovered, InvalidTokenError>
where
    V: Future<Output = Result<DecodedIdToken, AuthError>>,
    R: FnOnce(AuthError) -> RFut,
    RFut: Future<Output = Result<VerifiedTokens, Error>>,
{
    let verification = Verification::classify(verify.await);
    let key_mismatch = matches!(verification, Verification::KeyMismatch(_));

    match verification.next(policy) {
        Transition::Accept(decoded) => Ok(Recovered::Valid(on_valid(decoded))),
        Transition::Reject(e) => {
            tracing::debug!(reason = %e.reason(), error = %e, "ID token rejected");
            Err(e)
        }
        Transition::Refresh(trigger) => {
            tracing::debug!(code = %trigger.code(), "Refreshing ID token");
            match refresh(trigger).await {
                Ok(tokens) => {
                    if key_mismatch {
                        tracing::debug!("Refreshed token after key id mismatch");
                    }
                    Ok(Recovered::Refreshed(tokens))
                }
                Err(e) => {
                    let e = into_invalid_token(e);
                    tracing::debug!(reason = %e.reason(), error = %e, key_mismatch, "ID token refresh failed");
                    Err(e)
                }
            }
        }
    }
}

fn reject(e: AuthError) -> InvalidTokenError {
    let reason = if e.code() == AuthErrorCode::NoMatchingKid {
        InvalidTokenReason::InvalidKid
    } else {
        InvalidTokenReason::InvalidCredentials
    };
    InvalidTokenError::from_error(e, reason)
}

fn into_invalid_token(error: Error) -> InvalidTokenError {
    match error {
        Error::InvalidToken(e) => e,
        Error::Auth(e) => reject(e),
        other => reject(AuthError::with_message(
            AuthErrorCode::InternalError,
            other.to_string(),
        )),
    }
}
