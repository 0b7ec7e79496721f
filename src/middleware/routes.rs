use axum::extract::State;
use axum::http::{HeaderMap, HeaderName};
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use cookie::Cookie;
use serde_json::json;

use super::error::MiddlewareError;
use super::state::{AuthState, referer};
use crate::auth::CustomTokensOptions;
use crate::cookies::{
    refresh_auth_cookies, remove_auth_cookies, session_from_cookies, set_auth_cookies,
    set_cookie_headers,
};
use crate::error::{InvalidTokenError, InvalidTokenReason};
use crate::traits::{KeyResolver, UserLookup};
use crate::types::ParsedTokens;

const APP_CHECK_HEADER: &str = "x-firebase-appcheck";

/// Create the session router: `POST {auth_path}/login`, `/logout` and
/// `/refresh-token`.
pub fn auth_routes<K, U>(state: AuthState<K, U>) -> Router
where
    K: KeyResolver,
    U: UserLookup,
{
    Router::new()
        .route(&state.route("login"), post(login::<K, U>))
        .route(&state.route("logout"), post(logout::<K, U>))
        .route(&state.route("refresh-token"), post(refresh_token::<K, U>))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<K: KeyResolver, U: UserLookup>(
    State(state): State<AuthState<K, U>>,
    headers: HeaderMap,
) -> Result<Response, MiddlewareError> {
    let id_token = bearer_token(&headers).ok_or_else(|| {
        InvalidTokenError::new(InvalidTokenReason::MissingCredentials)
    })?;

    let options = CustomTokensOptions {
        app_check_token: header_value(&headers, APP_CHECK_HEADER),
        referer: referer(&headers),
        dynamic_custom_claims_keys: Vec::new(),
    };
    let tokens = state
        .auth
        .get_custom_id_and_refresh_tokens(id_token, &options)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login token exchange failed"))?;

    let mut parsed = ParsedTokens::from(tokens);
    if !state.auth.custom_token_enabled() {
        parsed.custom_token = None;
    }

    let cookies = set_auth_cookies(&parsed, &state.settings.cookies)?;
    tracing::info!("Session cookies issued");

    Ok(success(&cookies))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<K: KeyResolver, U: UserLookup>(
    State(state): State<AuthState<K, U>>,
) -> Response {
    let cookies = remove_auth_cookies(&state.settings.cookies);
    tracing::info!("Session cookies removed");
    success(&cookies)
}

// ── Refresh ────────────────────────────────────────────────────────

async fn refresh_token<K: KeyResolver, U: UserLookup>(
    State(state): State<AuthState<K, U>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Response, MiddlewareError> {
    let cookie_options = &state.settings.cookies;
    let tokens = session_from_cookies(
        |name| jar.get(name).map(|c| c.value().to_owned()),
        cookie_options,
    )?;
    let refresh_token = tokens
        .refresh_token
        .as_deref()
        .ok_or_else(|| InvalidTokenError::new(InvalidTokenReason::MissingRefreshToken))?;

    let verify_options = state.verify_options(&headers);
    let refreshed = state
        .auth
        .handle_token_refresh(refresh_token, &verify_options)
        .await?;

    let cookies = refresh_auth_cookies(&refreshed, cookie_options)?;
    tracing::info!(uid = %refreshed.decoded_id_token.sub, "Session refreshed");

    let body = json!({ "idToken": refreshed.id_token });
    Ok((set_cookies(&cookies), Json(body)).into_response())
}

// ── Helpers ────────────────────────────────────────────────────────

fn success(cookies: &[Cookie<'static>]) -> Response {
    (set_cookies(cookies), Json(json!({ "success": true }))).into_response()
}

fn set_cookies(cookies: &[Cookie<'static>]) -> AppendHeaders<Vec<(HeaderName, String)>> {
    AppendHeaders(
        set_cookie_headers(cookies)
            .into_iter()
            .map(|value| (SET_COOKIE, value))
            .collect(),
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
