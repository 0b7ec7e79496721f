use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use cookie::Cookie;

use super::state::AuthState;
use crate::cookies::{
    refresh_auth_cookies, remove_auth_cookies, session_from_cookies, set_cookie_headers,
    signature_cookie_name,
};
use crate::error::InvalidTokenReason;
use crate::traits::{KeyResolver, UserLookup};

/// Per-request session check.
///
/// Verifies the session cookies and, if the ID token expired, refreshes it
/// once. A verified session is stored in request extensions as
/// [`VerifiedTokens`](crate::VerifiedTokens) (read it with
/// [`AuthTokens`](super::AuthTokens)); refreshed sessions get new cookies on
/// the response. Requests without session cookies pass through untouched;
/// a lone payload or signature cookie, and sessions that cannot be healed,
/// are cleared.
///
/// # Example
///
/// ```rust,ignore
/// let state = AuthState::new(AuthConfig::from_env()?, keys)?;
/// let app = Router::new()
///     .route("/me", get(me))
///     .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware::<Keys, NoUserLookup>))
///     .merge(auth_routes(state));
/// ```
pub async fn auth_middleware<K, U>(
    State(state): State<AuthState<K, U>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response
where
    K: KeyResolver,
    U: UserLookup,
{
    let cookie_options = &state.settings.cookies;
    let tokens = match session_from_cookies(
        |name| jar.get(name).map(|c| c.value().to_owned()),
        cookie_options,
    ) {
        Ok(tokens) => tokens,
        Err(e)
            if e.reason() == InvalidTokenReason::MissingCredentials
                && jar.get(&cookie_options.cookie_name).is_none()
                && jar.get(&signature_cookie_name(&cookie_options.cookie_name)).is_none() =>
        {
            return next.run(request).await;
        }
        Err(e) => {
            tracing::warn!(reason = %e.reason(), "Discarding unverifiable session cookies");
            let mut response = next.run(request).await;
            append_cookies(response.headers_mut(), &remove_auth_cookies(cookie_options));
            return response;
        }
    };

    let options = state.verify_options(request.headers());
    match state
        .auth
        .verify_and_refresh_expired_id_token(&tokens, &options)
        .await
    {
        Ok(recovered) => {
            let refreshed = recovered.is_refreshed();
            let verified = recovered.into_tokens();
            let cookies = if refreshed {
                match refresh_auth_cookies(&verified, cookie_options) {
                    Ok(cookies) => Some(cookies),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize refreshed session");
                        None
                    }
                }
            } else {
                None
            };

            request.extensions_mut().insert(verified);
            let mut response = next.run(request).await;
            if let Some(cookies) = cookies {
                append_cookies(response.headers_mut(), &cookies);
            }
            response
        }
        Err(e) => {
            tracing::debug!(reason = %e.reason(), error = %e, "Session rejected");
            let mut response = next.run(request).await;
            append_cookies(response.headers_mut(), &remove_auth_cookies(cookie_options));
            response
        }
    }
}

fn append_cookies(headers: &mut HeaderMap, cookies: &[Cookie<'static>]) {
    for value in set_cookie_headers(cookies) {
        match HeaderValue::try_from(value) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Invalid Set-Cookie header"),
        }
    }
}
