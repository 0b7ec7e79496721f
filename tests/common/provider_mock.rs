//! Mock identity provider for integration testing
//!
//! Provides wiremock-based token endpoints (reached through the emulator host
//! override) and test ID token signing utilities.

use firebase_auth_edge::{AuthError, AuthOptions, ServiceAccount, StaticKeyResolver, Uid, UserLookup, UserRecord};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_ID: &str = "test-project";
pub const API_KEY: &str = "test-api-key";
pub const CLIENT_EMAIL: &str = "firebase-adminsdk@test-project.iam.gserviceaccount.com";

const TEST_KEY_ID: &str = "test-kid";
// Pre-generated 2048-bit RSA keypairs for testing (DO NOT use in production!)
const TEST_RSA_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/service_account_key.pem");
const TEST_RSA_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/service_account_key.pub.pem");

const REFRESH_PATH: &str = "/securetoken.googleapis.com/v1/token";
const CUSTOM_TOKEN_PATH: &str = "/identitytoolkit.googleapis.com/v1/accounts:signInWithCustomToken";
const SIGN_UP_PATH: &str = "/identitytoolkit.googleapis.com/v1/accounts:signUp";

/// ID token claims builder
#[derive(Debug, Clone)]
pub struct TestClaims(pub Value);

impl TestClaims {
    /// Claims of an ID token valid for the next hour
    pub fn valid(uid: &str) -> Self {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        Self(json!({
            "aud": PROJECT_ID,
            "iss": format!("https://securetoken.google.com/{PROJECT_ID}"),
            "sub": uid,
            "user_id": uid,
            "iat": now - 60,
            "auth_time": now - 60,
            "exp": now + 3600,
            "email": format!("{uid}@example.com"),
            "email_verified": true,
            "firebase": {
                "identities": {},
                "sign_in_provider": "password"
            }
        }))
    }

    /// Claims of an ID token that expired ten seconds ago
    #[allow(dead_code)]
    pub fn expired(uid: &str) -> Self {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let mut claims = Self::valid(uid);
        claims.0["iat"] = json!(now - 3610);
        claims.0["exp"] = json!(now - 10);
        claims
    }

    #[allow(dead_code)]
    pub fn with_claim(mut self, key: &str, value: Value) -> Self {
        self.0[key] = value;
        self
    }

    #[allow(dead_code)]
    pub fn without_claim(mut self, key: &str) -> Self {
        if let Some(claims) = self.0.as_object_mut() {
            claims.remove(key);
        }
        self
    }
}

/// Test keypair for signing ID tokens
pub struct TestKeyPair {
    encoding_key: EncodingKey,
}

impl TestKeyPair {
    pub fn load() -> Self {
        let encoding_key = EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_KEY_PEM.as_bytes())
            .expect("Failed to load test RSA key");
        Self { encoding_key }
    }

    pub fn sign(&self, claims: &TestClaims) -> String {
        self.sign_with_kid(claims, TEST_KEY_ID)
    }

    /// Sign claims with a different key ID (for unknown kid tests)
    pub fn sign_with_kid(&self, claims: &TestClaims, kid: &str) -> String {
        let mut header = Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims.0, &self.encoding_key).expect("Failed to sign JWT")
    }
}

/// Key resolver that knows the test key
pub fn keys() -> StaticKeyResolver {
    StaticKeyResolver::new()
        .with_rsa_pem(TEST_KEY_ID, TEST_RSA_PUBLIC_KEY_PEM)
        .expect("Failed to load test public key")
}

/// Options pointing at `emulator_host`, with a service account for custom tokens
pub fn auth_options(emulator_host: &str) -> AuthOptions {
    AuthOptions::new(PROJECT_ID, API_KEY)
        .with_emulator_host(emulator_host)
        .with_service_account(ServiceAccount::new(
            PROJECT_ID,
            CLIENT_EMAIL,
            TEST_RSA_PRIVATE_KEY_PEM,
        ))
}

/// User lookup returning one fixed record
pub struct FixedUsers(pub Option<UserRecord>);

impl UserLookup for FixedUsers {
    async fn get_user(&self, _uid: &Uid) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.0.clone())
    }
}

/// Identity provider mock server
pub struct ProviderMock {
    server: MockServer,
}

impl ProviderMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Emulator host (`ip:port`) of the mock server
    pub fn host(&self) -> String {
        self.server.address().to_string()
    }

    /// Refresh token exchange for `refresh_token`, expected `times` times
    #[allow(dead_code)]
    pub async fn expect_refresh(&self, refresh_token: &str, response: Value, times: u64) {
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .and(query_param("key", API_KEY))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains(format!("refresh_token={refresh_token}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Refresh token exchange rejected with `status` and `body`
    #[allow(dead_code)]
    pub async fn reject_refresh(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Fails the test if any refresh exchange is attempted
    #[allow(dead_code)]
    pub async fn forbid_refresh(&self) {
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    /// Custom token exchange answering with `id_token` / `refresh_token`
    #[allow(dead_code)]
    pub async fn expect_custom_token_exchange(&self, id_token: &str, refresh_token: &str) {
        Mock::given(method("POST"))
            .and(path(CUSTOM_TOKEN_PATH))
            .and(query_param("key", API_KEY))
            .and(body_string_contains("\"returnSecureToken\":true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "identitytoolkit#VerifyCustomTokenResponse",
                "idToken": id_token,
                "refreshToken": refresh_token,
                "expiresIn": "3600",
                "isNewUser": false
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Custom token exchange rejected with `status`
    #[allow(dead_code)]
    pub async fn reject_custom_token_exchange(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(CUSTOM_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"code": status, "message": "INVALID_CUSTOM_TOKEN"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Anonymous sign-up answering with a fixed account
    #[allow(dead_code)]
    pub async fn expect_sign_up(&self, local_id: &str) {
        Mock::given(method("POST"))
            .and(path(SIGN_UP_PATH))
            .and(query_param("key", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "idToken": "anonymous-id-token",
                "refreshToken": "anonymous-refresh-token",
                "localId": local_id,
                "expiresIn": "3600"
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Anonymous sign-up rejected with `status` and `body`
    #[allow(dead_code)]
    pub async fn reject_sign_up(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(SIGN_UP_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Requests received so far
    #[allow(dead_code)]
    pub async fn received(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}
