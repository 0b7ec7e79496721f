//! Cookie-session authentication middleware for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use firebase_auth_edge::middleware::{AuthConfig, AuthState, auth_middleware, auth_routes};
//!
//! // 1. Provide a KeyResolver backed by the provider's published keys
//! // 2. Configure from environment
//! let state = AuthState::new(AuthConfig::from_env()?, keys)?;
//!
//! // 3. Verify sessions on every request and mount login/logout routes
//! let app = axum::Router::new()
//!     .route("/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware::<Keys, NoUserLookup>))
//!     .merge(auth_routes(state));
//! ```

mod config;
mod error;
mod extractor;
mod layer;
mod routes;
mod state;

pub use config::AuthConfig;
pub use error::MiddlewareError;
pub use extractor::AuthTokens;
pub use layer::auth_middleware;
pub use routes::auth_routes;
pub use state::AuthState;
