use std::collections::HashMap;

use cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

use super::sign::{RawCookie, SignedCookies, SigningKeys, sign, signature_cookie_name, unsign_from};
use crate::error::{Error, InvalidTokenError, InvalidTokenReason};
use crate::types::{ParsedTokens, VerifiedTokens};

/// Default session lifetime.
pub const DEFAULT_MAX_AGE: Duration = Duration::days(12);

/// Attributes applied to both session cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age: Option<Duration>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".into(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: Some(DEFAULT_MAX_AGE),
        }
    }
}

impl CookieOptions {
    /// Set the `Path` attribute.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the `Domain` attribute.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the `Secure` attribute.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `HttpOnly` attribute.
    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `SameSite` attribute.
    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set `Max-Age`; `None` makes session-lifetime cookies.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    fn build(&self, name: String, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site);
        if let Some(domain) = &self.domain {
            cookie = cookie.domain(domain.clone());
        }
        if let Some(max_age) = self.max_age {
            cookie = cookie.max_age(max_age);
        }
        cookie.build()
    }
}

/// Cookie name, signing keys and attributes for one session.
#[derive(Debug, Clone)]
pub struct AuthCookieOptions {
    pub cookie_name: String,
    pub signature_keys: SigningKeys,
    pub serialize: CookieOptions,
}

impl AuthCookieOptions {
    /// Options for `cookie_name` signed with `signature_keys`, default attributes.
    #[must_use]
    pub fn new(cookie_name: impl Into<String>, signature_keys: SigningKeys) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            signature_keys,
            serialize: CookieOptions::default(),
        }
    }

    /// Replace the cookie attributes.
    #[must_use]
    pub fn with_serialize_options(mut self, serialize: CookieOptions) -> Self {
        self.serialize = serialize;
        self
    }
}

/// Serializes `tokens` to JSON and signs the result.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the tokens cannot be encoded.
pub fn to_signed_cookies(
    tokens: &ParsedTokens,
    options: &AuthCookieOptions,
) -> Result<SignedCookies, Error> {
    let value = serde_json::to_string(tokens)?;
    Ok(sign(
        &options.signature_keys,
        RawCookie::new(options.cookie_name.clone(), value),
    ))
}

/// Attaches attributes to a signed pair. The signature cookie comes first.
#[must_use]
pub fn auth_cookies(signed: SignedCookies, serialize: &CookieOptions) -> [Cookie<'static>; 2] {
    [
        serialize.build(signed.signature.name, signed.signature.value),
        serialize.build(signed.signed.name, signed.signed.value),
    ]
}

/// Cookies carrying a new session.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the tokens cannot be encoded.
pub fn set_auth_cookies(
    tokens: &ParsedTokens,
    options: &AuthCookieOptions,
) -> Result<[Cookie<'static>; 2], Error> {
    let signed = to_signed_cookies(tokens, options)?;
    Ok(auth_cookies(signed, &options.serialize))
}

/// Cookies carrying a refreshed session.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the tokens cannot be encoded.
pub fn refresh_auth_cookies(
    tokens: &VerifiedTokens,
    options: &AuthCookieOptions,
) -> Result<[Cookie<'static>; 2], Error> {
    set_auth_cookies(&tokens.to_parsed_tokens(), options)
}

/// Epoch-dated, empty cookies that clear both session cookies.
#[must_use]
pub fn remove_auth_cookies(options: &AuthCookieOptions) -> [Cookie<'static>; 2] {
    let serialize = options.serialize.clone().with_max_age(None);
    let expire = |name: String| {
        let mut cookie = serialize.build(name, String::new());
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie
    };
    [
        expire(signature_cookie_name(&options.cookie_name)),
        expire(options.cookie_name.clone()),
    ]
}

/// Verifies the session cookies found through `lookup` and decodes the tokens.
///
/// # Errors
///
/// [`Error::MissingCookie`], [`Error::InvalidSignature`], or
/// [`Error::Serialization`] for a payload that is not a token set.
pub fn parse_tokens_from_cookies<F>(
    lookup: F,
    options: &AuthCookieOptions,
) -> Result<ParsedTokens, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let cookie = unsign_from(&options.signature_keys, &options.cookie_name, lookup)?;
    Ok(serde_json::from_str(&cookie.value)?)
}

/// Like [`parse_tokens_from_cookies`], with failures classified as a session
/// rejection.
///
/// # Errors
///
/// [`InvalidTokenReason::MissingCredentials`] if either cookie is absent,
/// [`InvalidTokenReason::InvalidSignature`] if the pair does not verify or
/// the payload is not a token set.
pub fn session_from_cookies<F>(
    lookup: F,
    options: &AuthCookieOptions,
) -> Result<ParsedTokens, InvalidTokenError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_tokens_from_cookies(lookup, options).map_err(|e| match e {
        Error::MissingCookie(_) => InvalidTokenError::new(InvalidTokenReason::MissingCredentials),
        e => {
            tracing::debug!(error = %e, cookie = %options.cookie_name, "Session cookies failed verification");
            InvalidTokenError::new(InvalidTokenReason::InvalidSignature)
        }
    })
}

/// `Set-Cookie` header values, percent-encoded.
#[must_use]
pub fn set_cookie_headers(cookies: &[Cookie<'static>]) -> Vec<String> {
    cookies
        .iter()
        .map(|cookie| cookie.encoded().to_string())
        .collect()
}

/// Name/value pairs of a `Cookie` request header, percent-decoded.
#[must_use]
pub fn cookies_from_header(header: &str) -> HashMap<String, String> {
    Cookie::split_parse_encoded(header)
        .filter_map(Result::ok)
        .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
        .collect()
}
