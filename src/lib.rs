#![doc = include_str!("../README.md")]

pub mod auth;
pub mod cookies;
pub mod credential;
pub mod error;
pub mod exchange;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod recovery;
pub mod token;
pub mod traits;
pub mod types;

// Re-exports for convenient access
pub use auth::{Auth, AuthOptions, CustomTokensOptions, VerifyOptions};
pub use cookies::{AuthCookieOptions, CookieOptions, SignedCookies, SigningKeys};
pub use credential::ServiceAccount;
pub use error::{AuthError, AuthErrorCode, Error, InvalidTokenError, InvalidTokenReason};
pub use exchange::{Endpoints, ExchangeOptions, ProviderError, TokenExchangeClient};
pub use recovery::{Recovered, RecoveryPolicy};
pub use token::{CustomTokenGenerator, DecodedIdToken, IdTokenVerifier, StaticKeyResolver};
pub use traits::{KeyResolver, NoUserLookup, UserLookup};
pub use types::{
    AnonymousTokens, CustomTokens, IdAndRefreshTokens, KeyId, ParsedTokens, Uid, UserRecord,
    VerifiedTokens,
};
