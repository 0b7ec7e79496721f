//! ID token verification and custom token minting.

mod claims;
mod generator;
mod keys;
mod verifier;

pub use claims::{DecodedIdToken, FirebaseClaims, filter_standard_claims};
pub use generator::CustomTokenGenerator;
pub use keys::StaticKeyResolver;
pub use verifier::{IdTokenVerifier, ensure_not_revoked_or_disabled};
