use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use url::Url;

use crate::error::{AuthError, AuthErrorCode, Error};
use crate::types::{AnonymousTokens, IdAndRefreshTokens};

const IDENTITY_TOOLKIT_HOST: &str = "identitytoolkit.googleapis.com";
const SECURE_TOKEN_HOST: &str = "securetoken.googleapis.com";
const APP_CHECK_HEADER: &str = "X-Firebase-AppCheck";

/// Base URL for a provider service, routed through the emulator when one is set.
///
/// The emulator host may carry its own `http://` scheme; otherwise one is added.
///
/// # Errors
///
/// Returns [`Error::Config`] if the resulting URL is invalid.
pub fn resolve_endpoint(service_host: &str, emulator_host: Option<&str>) -> Result<Url, Error> {
    let base = match emulator_host {
        Some(host) => {
            let host = host.trim_end_matches('/');
            let scheme = if host.starts_with("http://") { "" } else { "http://" };
            format!("{scheme}{host}/{service_host}/")
        }
        None => format!("https://{service_host}/"),
    };
    base.parse()
        .map_err(|e| Error::Config(format!("invalid endpoint {base}: {e}")))
}

/// Identity provider REST endpoints.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Endpoints {
    pub sign_in_with_custom_token: Url,
    pub sign_up: Url,
    pub token: Url,
}

impl Endpoints {
    /// Production endpoints.
    #[must_use]
    pub fn production() -> Self {
        Self::resolve(None).expect("valid default URL")
    }

    /// Endpoints served by a local emulator, e.g. `"127.0.0.1:9099"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host does not form a valid URL.
    pub fn emulator(host: &str) -> Result<Self, Error> {
        Self::resolve(Some(host))
    }

    /// Production endpoints unless `emulator_host` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host does not form a valid URL.
    pub fn resolve(emulator_host: Option<&str>) -> Result<Self, Error> {
        let toolkit = resolve_endpoint(IDENTITY_TOOLKIT_HOST, emulator_host)?;
        let secure_token = resolve_endpoint(SECURE_TOKEN_HOST, emulator_host)?;
        let join = |base: &Url, path: &str| {
            base.join(path)
                .map_err(|e| Error::Config(format!("invalid endpoint path {path}: {e}")))
        };

        Ok(Self {
            sign_in_with_custom_token: join(&toolkit, "v1/accounts:signInWithCustomToken")?,
            sign_up: join(&toolkit, "v1/accounts:signUp")?,
            token: join(&secure_token, "v1/token")?,
        })
    }
}

/// Error body returned by the provider, classified once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    UserNotFound,
    Other(JsonValue),
}

impl ProviderError {
    /// Classifies a provider error body; only `USER_NOT_FOUND` is singled out.
    #[must_use]
    pub fn classify(body: JsonValue) -> Self {
        let error = &body["error"];
        if error["code"] == 400 && error["message"] == "USER_NOT_FOUND" {
            Self::UserNotFound
        } else {
            Self::Other(body)
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::UserNotFound => AuthError::new(AuthErrorCode::UserNotFound),
            ProviderError::Other(raw) => {
                let description = raw["error_description"]
                    .as_str()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default();
                AuthError::with_message(
                    AuthErrorCode::InvalidCredential,
                    format!("Error fetching access token: {}{description}", raw["error"]),
                )
            }
        }
    }
}

/// Optional request decorations for custom token exchange and sign-up.
#[derive(Debug, Clone, Default)]
pub struct ExchangeOptions {
    pub tenant_id: Option<String>,
    pub app_check_token: Option<String>,
    pub referer: Option<String>,
}

impl ExchangeOptions {
    /// Sign in or sign up within this tenant (`tenantId` in the request body).
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Forward an App Check token as `X-Firebase-AppCheck`.
    #[must_use]
    pub fn with_app_check_token(mut self, token: impl Into<String>) -> Self {
        self.app_check_token = Some(token.into());
        self
    }

    /// Forward the caller's `Referer`, for API keys restricted by HTTP referrer.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

#[derive(Deserialize)]
struct RefreshTokenResponse {
    id_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
}

/// Client for the provider's token endpoints.
///
/// Holds no session state: every call is a single outbound request.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    api_key: String,
    endpoints: Endpoints,
    http: reqwest::Client,
}

impl TokenExchangeClient {
    /// Client calling `endpoints` with the web `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>, endpoints: Endpoints) -> Self {
        Self {
            api_key: api_key.into(),
            endpoints,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Endpoints this client sends requests to.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchanges a refresh token for a new token pair.
    ///
    /// The provider may rotate the refresh token; callers must keep the
    /// returned one and drop the old.
    ///
    /// # Errors
    ///
    /// [`Error::Auth`] with [`AuthErrorCode::UserNotFound`] when the user is
    /// gone, [`AuthErrorCode::InvalidCredential`] (carrying the raw provider
    /// error) for any other rejection, or [`Error::Http`] on network failure.
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        referer: Option<&str>,
    ) -> Result<IdAndRefreshTokens, Error> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let mut request = self
            .http
            .post(self.endpoints.token.clone())
            .query(&[("key", self.api_key.as_str())])
            .form(&params);
        if let Some(referer) = referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = Self::error_body(response).await;
            let error = ProviderError::classify(body);
            tracing::warn!(status, error = ?error, "Refresh token exchange rejected");
            return Err(AuthError::from(error).into());
        }

        let data = response.json::<RefreshTokenResponse>().await?;
        Ok(IdAndRefreshTokens {
            id_token: data.id_token,
            refresh_token: data.refresh_token,
        })
    }

    /// Exchanges a custom token for an ID + refresh token pair.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] if the provider rejects the token, or
    /// [`Error::Http`] on network failure.
    pub async fn exchange_custom_token(
        &self,
        custom_token: &str,
        options: &ExchangeOptions,
    ) -> Result<IdAndRefreshTokens, Error> {
        let mut body = json!({
            "token": custom_token,
            "returnSecureToken": true,
        });
        if let Some(tenant_id) = &options.tenant_id {
            body["tenantId"] = json!(tenant_id);
        }

        let response = self
            .decorate(self.http.post(self.endpoints.sign_in_with_custom_token.clone()), options)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response, "custom token exchange").await?;
        let data = response.json::<SignInResponse>().await?;
        Ok(IdAndRefreshTokens {
            id_token: data.id_token,
            refresh_token: data.refresh_token,
        })
    }

    /// Creates an anonymous account; the provider response is returned as-is.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] carrying the raw provider body on a non-2xx
    /// response, or [`Error::Http`] on network failure.
    pub async fn create_anonymous_account(
        &self,
        options: &ExchangeOptions,
    ) -> Result<AnonymousTokens, Error> {
        let mut body = json!({ "returnSecureToken": true });
        if let Some(tenant_id) = &options.tenant_id {
            body["tenantId"] = json!(tenant_id);
        }

        let response = self
            .decorate(self.http.post(self.endpoints.sign_up.clone()), options)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response, "anonymous sign-up").await?;
        response.json::<AnonymousTokens>().await.map_err(Into::into)
    }

    fn decorate(
        &self,
        request: reqwest::RequestBuilder,
        options: &ExchangeOptions,
    ) -> reqwest::RequestBuilder {
        let mut request = request.query(&[("key", self.api_key.as_str())]);
        if let Some(referer) = &options.referer {
            request = request.header(reqwest::header::REFERER, referer);
        }
        if let Some(app_check) = &options.app_check_token {
            request = request.header(APP_CHECK_HEADER, app_check);
        }
        request
    }

    async fn error_body(response: reqwest::Response) -> JsonValue {
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Provider {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}
