use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Ordered cookie signing keys, newest first.
///
/// Signing always uses the first key; verification accepts a tag produced by
/// any of them, so an outgoing key can stay in the list until its cookies
/// expire.
#[derive(Clone)]
pub struct SigningKeys {
    macs: Vec<HmacSha256>,
}

impl SigningKeys {
    /// Length of keys produced by [`generate`](Self::generate).
    pub const GENERATED_KEY_LENGTH: usize = 32;

    /// # Errors
    ///
    /// Returns [`Error::Config`] if no key is given or a key is empty.
    pub fn new<I, B>(keys: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let macs = keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                if key.is_empty() {
                    return Err(Error::Config("cookie signing key must not be empty".into()));
                }
                HmacSha256::new_from_slice(key)
                    .map_err(|e| Error::Config(format!("invalid cookie signing key: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if macs.is_empty() {
            return Err(Error::Config("at least one cookie signing key is required".into()));
        }
        Ok(Self { macs })
    }

    /// A single random key. Cookies signed with it do not survive a restart.
    #[must_use]
    pub fn generate() -> Self {
        let key = rand::random::<[u8; Self::GENERATED_KEY_LENGTH]>();
        Self {
            macs: vec![HmacSha256::new_from_slice(&key).expect("HMAC accepts keys of any length")],
        }
    }

    /// Number of keys accepted for verification.
    #[must_use]
    pub fn len(&self) -> usize {
        self.macs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macs.is_empty()
    }

    /// Base64url tag of `value` under the newest key.
    #[must_use]
    pub fn sign(&self, value: &str) -> String {
        let mut mac = self.macs[0].clone();
        mac.update(value.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Whether `signature` is a valid tag of `value` under any key.
    #[must_use]
    pub fn verify(&self, value: &str, signature: &str) -> bool {
        let Ok(tag) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        self.macs.iter().any(|mac| {
            let mut mac = mac.clone();
            mac.update(value.as_bytes());
            mac.verify_slice(&tag).is_ok()
        })
    }
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys")
            .field("count", &self.macs.len())
            .finish_non_exhaustive()
    }
}

/// Bare name/value pair, before any serialization attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCookie {
    pub name: String,
    pub value: String,
}

impl RawCookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Payload cookie plus the cookie carrying its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCookies {
    pub signature: RawCookie,
    pub signed: RawCookie,
}

/// Name of the cookie holding the tag for `name`.
#[must_use]
pub fn signature_cookie_name(name: &str) -> String {
    format!("{name}.sig")
}

/// Signs `cookie` with the newest key.
#[must_use]
pub fn sign(keys: &SigningKeys, cookie: RawCookie) -> SignedCookies {
    SignedCookies {
        signature: RawCookie {
            name: signature_cookie_name(&cookie.name),
            value: keys.sign(&cookie.value),
        },
        signed: cookie,
    }
}

/// Returns the payload cookie if its tag verifies under any key.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if no key produces the tag.
pub fn unsign(keys: &SigningKeys, cookies: SignedCookies) -> Result<RawCookie, Error> {
    if keys.verify(&cookies.signed.value, &cookies.signature.value) {
        Ok(cookies.signed)
    } else {
        Err(Error::InvalidSignature)
    }
}

/// Reads the `name` cookie pair through `lookup` and verifies it.
///
/// # Errors
///
/// [`Error::MissingCookie`] if either cookie is absent, otherwise as [`unsign`].
pub fn unsign_from<F>(keys: &SigningKeys, name: &str, lookup: F) -> Result<RawCookie, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let signature_name = signature_cookie_name(name);
    let signed = lookup(name).ok_or_else(|| Error::MissingCookie(name.to_owned()))?;
    let signature = lookup(&signature_name).ok_or_else(|| Error::MissingCookie(signature_name.clone()))?;

    unsign(
        keys,
        SignedCookies {
            signature: RawCookie::new(signature_name, signature),
            signed: RawCookie::new(name, signed),
        },
    )
}
