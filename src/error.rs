use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of authentication error codes.
///
/// The code is the only thing callers should branch on; messages are for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthErrorCode {
    UserNotFound,
    UserDisabled,
    TokenRevoked,
    TokenExpired,
    NoMatchingKid,
    InvalidCredential,
    InvalidArgument,
    InternalError,
}

impl AuthErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UserDisabled => "USER_DISABLED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::NoMatchingKid => "NO_MATCHING_KID",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Self::UserNotFound => "There is no user record corresponding to the provided identifier.",
            Self::UserDisabled => "The user record is disabled.",
            Self::TokenRevoked => "The provided token has been revoked.",
            Self::TokenExpired => "The provided token has expired.",
            Self::NoMatchingKid => "The token's key id does not match any known public key.",
            Self::InvalidCredential => "The provided credential is invalid.",
            Self::InvalidArgument => "Invalid argument provided.",
            Self::InternalError => "An internal error has occurred.",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication failure tagged with a stable [`AuthErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AuthError {
    code: AuthErrorCode,
    message: String,
}

impl AuthError {
    /// Error with the code's default message.
    #[must_use]
    pub fn new(code: AuthErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_owned(),
        }
    }

    /// Error with a message replacing the default one for `code`.
    #[must_use]
    pub fn with_message(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_user_not_found(&self) -> bool {
        self.code == AuthErrorCode::UserNotFound
    }

    #[must_use]
    pub fn is_invalid_credential(&self) -> bool {
        self.code == AuthErrorCode::InvalidCredential
    }
}

impl From<AuthErrorCode> for AuthError {
    fn from(code: AuthErrorCode) -> Self {
        Self::new(code)
    }
}

/// Why a session's tokens could not be accepted or healed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidTokenReason {
    MissingCredentials,
    MissingRefreshToken,
    InvalidCredentials,
    InvalidKid,
    InvalidSignature,
}

impl InvalidTokenReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidKid => "INVALID_KID",
            Self::InvalidSignature => "INVALID_SIGNATURE",
        }
    }
}

impl fmt::Display for InvalidTokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of the verify/refresh flow.
///
/// Carries the [`AuthError`] that caused it, when there is one, so the
/// original code stays observable through [`InvalidTokenError::code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTokenError {
    reason: InvalidTokenReason,
    source: Option<AuthError>,
}

impl InvalidTokenError {
    #[must_use]
    pub fn new(reason: InvalidTokenReason) -> Self {
        Self {
            reason,
            source: None,
        }
    }

    /// Rejection for `reason`, caused by `error`.
    #[must_use]
    pub fn from_error(error: AuthError, reason: InvalidTokenReason) -> Self {
        Self {
            reason,
            source: Some(error),
        }
    }

    #[must_use]
    pub fn reason(&self) -> InvalidTokenReason {
        self.reason
    }

    /// Code of the wrapped error, if any.
    #[must_use]
    pub fn code(&self) -> Option<AuthErrorCode> {
        self.source.as_ref().map(AuthError::code)
    }

    #[must_use]
    pub fn auth_error(&self) -> Option<&AuthError> {
        self.source.as_ref()
    }
}

impl fmt::Display for InvalidTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "invalid token ({}): {source}", self.reason),
            None => write!(f, "invalid token ({})", self.reason),
        }
    }
}

impl std::error::Error for InvalidTokenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    InvalidToken(#[from] InvalidTokenError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Identity provider rejected a request that has no structured recovery path.
    #[error("{operation} failed (status: {status:?}): {detail}")]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("missing cookie: {0}")]
    MissingCookie(String),
    #[error("cookie signature does not match any signing key")]
    InvalidSignature,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable code when the error came out of verification or exchange.
    #[must_use]
    pub fn auth_code(&self) -> Option<AuthErrorCode> {
        match self {
            Self::Auth(e) => Some(e.code()),
            Self::InvalidToken(e) => e.code(),
            _ => None,
        }
    }
}
