use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Claims that are never copied into a custom token.
const STANDARD_CLAIMS: &[&str] = &[
    "aud",
    "auth_time",
    "email",
    "email_verified",
    "exp",
    "firebase",
    "iat",
    "iss",
    "name",
    "phone_number",
    "picture",
    "sub",
    "uid",
    "user_id",
];

/// Provider-specific `firebase` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirebaseClaims {
    #[serde(default)]
    pub identities: Map<String, JsonValue>,
    pub sign_in_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_second_factor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_factor_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Claims of a verified ID token.
///
/// Rebuilt on every verification, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedIdToken {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    pub firebase: FirebaseClaims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Everything else, including developer claims set through custom tokens.
    #[serde(flatten)]
    pub custom_claims: Map<String, JsonValue>,
}

impl DecodedIdToken {
    /// The user id; identical to `sub`.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.sub
    }

    #[must_use]
    pub fn sign_in_provider(&self) -> &str {
        &self.firebase.sign_in_provider
    }

    /// A claim outside the typed fields, e.g. a custom claim.
    #[must_use]
    pub fn claim(&self, key: &str) -> Option<&JsonValue> {
        self.custom_claims.get(key)
    }
}

/// Developer claims of a decoded token, without any standard claim.
#[must_use]
pub fn filter_standard_claims(token: &DecodedIdToken) -> Map<String, JsonValue> {
    token
        .custom_claims
        .iter()
        .filter(|(key, _)| !STANDARD_CLAIMS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
