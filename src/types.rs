use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::token::DecodedIdToken;

/// Firebase user identifier (`sub` / `uid` claim).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Uid(pub String);

impl Uid {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Key identifier from a JWT header (`kid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct KeyId(pub String);

impl KeyId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// ID + refresh token pair issued by the identity provider.
///
/// Never mutated: a refresh produces a new pair, and the old refresh token
/// must be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdAndRefreshTokens {
    pub id_token: String,
    pub refresh_token: String,
}

/// Tokens read back out of a verified session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTokens {
    pub id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_token: Option<String>,
}

impl From<IdAndRefreshTokens> for ParsedTokens {
    fn from(tokens: IdAndRefreshTokens) -> Self {
        Self {
            id_token: tokens.id_token,
            refresh_token: Some(tokens.refresh_token),
            custom_token: None,
        }
    }
}

/// Authoritative session state for one request.
#[derive(Debug, Clone)]
pub struct VerifiedTokens {
    pub decoded_id_token: DecodedIdToken,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub custom_token: Option<String>,
}

impl VerifiedTokens {
    /// Cookie payload for this session.
    #[must_use]
    pub fn to_parsed_tokens(&self) -> ParsedTokens {
        ParsedTokens {
            id_token: self.id_token.clone(),
            refresh_token: self.refresh_token.clone(),
            custom_token: self.custom_token.clone(),
        }
    }
}

/// Tokens produced by round-tripping through a freshly minted custom token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTokens {
    pub id_token: String,
    pub refresh_token: String,
    pub custom_token: String,
}

impl From<CustomTokens> for ParsedTokens {
    fn from(tokens: CustomTokens) -> Self {
        Self {
            id_token: tokens.id_token,
            refresh_token: Some(tokens.refresh_token),
            custom_token: Some(tokens.custom_token),
        }
    }
}

/// Raw sign-up response for an anonymous account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousTokens {
    pub id_token: String,
    pub refresh_token: String,
    pub local_id: String,
}

/// Subset of a user record needed for revocation checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub uid: Uid,
    pub disabled: bool,
    /// Tokens authenticated before this instant are revoked.
    pub tokens_valid_after_time: Option<OffsetDateTime>,
}

impl UserRecord {
    /// Enabled user with no revocation time.
    #[must_use]
    pub fn new(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            disabled: false,
            tokens_valid_after_time: None,
        }
    }

    /// Mark the user disabled.
    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Reject tokens authenticated before `time`.
    #[must_use]
    pub fn with_tokens_valid_after_time(mut self, time: OffsetDateTime) -> Self {
        self.tokens_valid_after_time = Some(time);
        self
    }
}
