//! Integration tests for the verify → refresh → re-verify flow
//!
//! These tests use wiremock to stand in for the identity provider's token
//! endpoints, reached through the emulator host override.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use firebase_auth_edge::{
    Auth, AuthErrorCode, CustomTokensOptions, Error, ExchangeOptions, InvalidTokenReason,
    ParsedTokens, StaticKeyResolver, UserRecord, VerifyOptions,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Value, json};
use common::{FixedUsers, ProviderMock, TestClaims, TestKeyPair, auth_options, keys};

fn auth(provider: &ProviderMock) -> Auth<StaticKeyResolver> {
    Auth::new(auth_options(&provider.host()), keys()).expect("valid test options")
}

fn expired_session(refresh_token: Option<&str>) -> ParsedTokens {
    ParsedTokens {
        id_token: TestKeyPair::load().sign(&TestClaims::expired("uid-1")),
        refresh_token: refresh_token.map(str::to_owned),
        custom_token: None,
    }
}

fn refreshed_pair(id_token: String) -> Value {
    json!({
        "id_token": id_token,
        "refresh_token": "RT2",
        "expires_in": "3600",
        "token_type": "Bearer",
        "user_id": "uid-1",
        "project_id": "1234"
    })
}

#[tokio::test]
async fn test_expired_token_is_refreshed_with_single_callback() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_refresh("RT1", refreshed_pair(it2.clone()), 1).await;

    let calls = AtomicUsize::new(0);
    let result = auth(&provider)
        .verify_and_refresh_expired_id_token_with(
            &expired_session(Some("RT1")),
            &VerifyOptions::default(),
            |tokens| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(tokens.refresh_token.as_deref(), Some("RT2"));
                async { Ok(()) }
            },
        )
        .await
        .expect("expired session should be healed");

    assert!(result.is_refreshed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let tokens = result.into_tokens();
    assert_eq!(tokens.id_token, it2);
    assert_eq!(tokens.refresh_token.as_deref(), Some("RT2"));
    assert_eq!(tokens.decoded_id_token.uid(), "uid-1");
    assert!(tokens.decoded_id_token.exp > time::OffsetDateTime::now_utc().unix_timestamp());
}

#[tokio::test]
async fn test_valid_token_is_returned_without_refresh() {
    let provider = ProviderMock::start().await;
    provider.forbid_refresh().await;

    let session = ParsedTokens {
        id_token: TestKeyPair::load().sign(&TestClaims::valid("uid-1")),
        refresh_token: Some("RT1".into()),
        custom_token: Some("CT1".into()),
    };
    let result = auth(&provider)
        .verify_and_refresh_expired_id_token(&session, &VerifyOptions::default())
        .await
        .unwrap();

    assert!(!result.is_refreshed());
    assert_eq!(result.tokens().to_parsed_tokens(), session);
}

#[tokio::test]
async fn test_refreshed_token_failing_verification_is_not_retried() {
    let provider = ProviderMock::start().await;
    let still_expired = TestKeyPair::load().sign(&TestClaims::expired("uid-1"));
    provider.expect_refresh("RT1", refreshed_pair(still_expired), 1).await;

    let err = auth(&provider)
        .verify_and_refresh_expired_id_token(&expired_session(Some("RT1")), &VerifyOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), InvalidTokenReason::InvalidCredentials);
    assert_eq!(err.code(), Some(AuthErrorCode::TokenExpired));
}

#[tokio::test]
async fn test_missing_refresh_token_never_calls_provider() {
    let provider = ProviderMock::start().await;
    provider.forbid_refresh().await;

    let err = auth(&provider)
        .verify_and_refresh_expired_id_token(&expired_session(None), &VerifyOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), InvalidTokenReason::MissingRefreshToken);
    assert!(provider.received().await.is_empty());
}

#[tokio::test]
async fn test_unknown_kid_propagates_without_opt_in() {
    let provider = ProviderMock::start().await;
    provider.forbid_refresh().await;

    let session = ParsedTokens {
        id_token: TestKeyPair::load().sign_with_kid(&TestClaims::valid("uid-1"), "rotated-kid"),
        refresh_token: Some("RT1".into()),
        custom_token: None,
    };
    let err = auth(&provider)
        .verify_and_refresh_expired_id_token(&session, &VerifyOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), InvalidTokenReason::InvalidKid);
    assert_eq!(err.code(), Some(AuthErrorCode::NoMatchingKid));
}

#[tokio::test]
async fn test_unknown_kid_is_refreshed_with_opt_in() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_refresh("RT1", refreshed_pair(it2.clone()), 1).await;

    let session = ParsedTokens {
        id_token: TestKeyPair::load().sign_with_kid(&TestClaims::valid("uid-1"), "rotated-kid"),
        refresh_token: Some("RT1".into()),
        custom_token: None,
    };
    let options = VerifyOptions::default().with_refresh_on_expired_kid(true);
    let result = auth(&provider)
        .verify_and_refresh_expired_id_token(&session, &options)
        .await
        .unwrap();

    assert!(result.is_refreshed());
    assert_eq!(result.tokens().id_token, it2);
}

#[tokio::test]
async fn test_revocation_check_is_off_by_default() {
    let provider = ProviderMock::start().await;
    let disabled = UserRecord::new("uid-1").with_disabled(true);
    let auth = auth(&provider).with_user_lookup(FixedUsers(Some(disabled)));
    let token = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));

    let decoded = auth
        .verify_id_token(&token, &VerifyOptions::default())
        .await
        .expect("disabled users pass without a revocation check");
    assert_eq!(decoded.uid(), "uid-1");

    let err = auth
        .verify_id_token(&token, &VerifyOptions::default().with_check_revoked(true))
        .await
        .unwrap_err();
    assert_eq!(err.code(), AuthErrorCode::UserDisabled);
}

#[tokio::test]
async fn test_refreshed_token_is_rechecked_for_revocation() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_refresh("RT1", refreshed_pair(it2), 1).await;

    let disabled = UserRecord::new("uid-1").with_disabled(true);
    let auth = auth(&provider).with_user_lookup(FixedUsers(Some(disabled)));

    let err = auth
        .verify_and_refresh_expired_id_token(
            &expired_session(Some("RT1")),
            &VerifyOptions::default().with_check_revoked(true),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(AuthErrorCode::UserDisabled));
}

#[tokio::test]
async fn test_user_not_found_on_refresh_is_classified() {
    let provider = ProviderMock::start().await;
    provider
        .reject_refresh(
            400,
            json!({"error": {"code": 400, "message": "USER_NOT_FOUND", "status": "INVALID_ARGUMENT"}}),
        )
        .await;

    let err = auth(&provider)
        .handle_token_refresh("RT1", &VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.auth_code(), Some(AuthErrorCode::UserNotFound));
}

#[tokio::test]
async fn test_other_refresh_errors_keep_provider_payload() {
    let provider = ProviderMock::start().await;
    provider
        .reject_refresh(
            400,
            json!({"error": {"code": 400, "message": "TOKEN_EXPIRED"}}),
        )
        .await;

    let err = auth(&provider)
        .verify_and_refresh_expired_id_token(&expired_session(Some("RT1")), &VerifyOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), InvalidTokenReason::InvalidCredentials);
    assert_eq!(err.code(), Some(AuthErrorCode::InvalidCredential));
    let message = err.auth_error().map(|e| e.message().to_owned()).unwrap_or_default();
    assert!(message.contains("TOKEN_EXPIRED"), "message: {message}");
}

#[tokio::test]
async fn test_failing_callback_fails_the_refresh() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_refresh("RT1", refreshed_pair(it2), 1).await;

    let err = auth(&provider)
        .verify_and_refresh_expired_id_token_with(
            &expired_session(Some("RT1")),
            &VerifyOptions::default(),
            |_| async { Err(Error::Config("cookie store unavailable".into())) },
        )
        .await
        .unwrap_err();

    assert_eq!(err.reason(), InvalidTokenReason::InvalidCredentials);
    assert_eq!(err.code(), Some(AuthErrorCode::InternalError));
}

#[tokio::test]
async fn test_refresh_mints_custom_token_when_enabled() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_refresh("RT1", refreshed_pair(it2), 1).await;

    let auth = Auth::new(
        auth_options(&provider.host()).with_custom_token_enabled(true),
        keys(),
    )
    .unwrap();
    let tokens = auth
        .handle_token_refresh("RT1", &VerifyOptions::default())
        .await
        .unwrap();

    let custom_token = tokens.custom_token.expect("custom token minted");
    let claims = decode_custom_token(&custom_token);
    assert_eq!(claims["uid"], "uid-1");
    assert_eq!(claims["claims"]["email_verified"], true);
    assert_eq!(claims["claims"]["source_sign_in_provider"], "password");
}

#[tokio::test]
async fn test_custom_tokens_carry_developer_claims() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_custom_token_exchange(&it2, "RT2").await;

    let id_token = TestKeyPair::load().sign(
        &TestClaims::valid("uid-1")
            .with_claim("role", json!("admin"))
            .with_claim("session_nonce", json!("abc")),
    );
    let options = CustomTokensOptions {
        app_check_token: Some("app-check".into()),
        referer: Some("https://app.example.com/".into()),
        dynamic_custom_claims_keys: vec!["session_nonce".into()],
    };
    let tokens = auth(&provider)
        .get_custom_id_and_refresh_tokens(&id_token, &options)
        .await
        .unwrap();

    assert_eq!(tokens.id_token, it2);
    assert_eq!(tokens.refresh_token, "RT2");

    let claims = decode_custom_token(&tokens.custom_token);
    assert_eq!(claims["claims"]["role"], "admin");
    assert!(claims["claims"].get("session_nonce").is_none());
    assert!(claims["claims"].get("user_id").is_none());

    let requests = provider.received().await;
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert_eq!(headers.get("x-firebase-appcheck").unwrap(), "app-check");
    assert_eq!(headers.get("referer").unwrap(), "https://app.example.com/");
}

#[tokio::test]
async fn test_rejected_custom_token_exchange_is_provider_error() {
    let provider = ProviderMock::start().await;
    provider.reject_custom_token_exchange(400).await;

    let id_token = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    let err = auth(&provider)
        .get_custom_id_and_refresh_tokens(&id_token, &CustomTokensOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::Provider { status, detail, .. } => {
            assert_eq!(status, Some(400));
            assert!(detail.contains("INVALID_CUSTOM_TOKEN"));
        }
        other => panic!("Expected provider error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_anonymous_user_is_passed_through() {
    let provider = ProviderMock::start().await;
    provider.expect_sign_up("anon-uid").await;

    let tokens = auth(&provider)
        .create_anonymous_user(&ExchangeOptions::default())
        .await
        .unwrap();

    assert_eq!(tokens.local_id, "anon-uid");
    assert_eq!(tokens.id_token, "anonymous-id-token");
}

#[tokio::test]
async fn test_refreshed_token_issued_slightly_ahead_is_accepted() {
    let provider = ProviderMock::start().await;
    let ahead = time::OffsetDateTime::now_utc().unix_timestamp() + 2;
    let it2 = TestKeyPair::load().sign(
        &TestClaims::valid("uid-1")
            .with_claim("iat", json!(ahead))
            .with_claim("auth_time", json!(ahead)),
    );
    provider.expect_refresh("RT1", refreshed_pair(it2.clone()), 1).await;

    let result = auth(&provider)
        .verify_and_refresh_expired_id_token(&expired_session(Some("RT1")), &VerifyOptions::default())
        .await
        .expect("provider clock drift should not sign the user out");

    assert!(result.is_refreshed());
    assert_eq!(result.tokens().id_token, it2);
}

#[tokio::test]
async fn test_refresh_forwards_referer() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_refresh("RT1", refreshed_pair(it2), 1).await;

    auth(&provider)
        .handle_token_refresh(
            "RT1",
            &VerifyOptions::default().with_referer("https://app.example.com/"),
        )
        .await
        .unwrap();

    let requests = provider.received().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].headers.get("referer").unwrap(),
        "https://app.example.com/"
    );
}

#[tokio::test]
async fn test_tenant_is_sent_on_custom_token_exchange() {
    let provider = ProviderMock::start().await;
    let tenant_claims = TestClaims::valid("uid-1").with_claim(
        "firebase",
        json!({"identities": {}, "sign_in_provider": "password", "tenant": "tenant-a"}),
    );
    let it2 = TestKeyPair::load().sign(&tenant_claims);
    provider.expect_custom_token_exchange(&it2, "RT2").await;

    let auth = Auth::new(auth_options(&provider.host()).with_tenant_id("tenant-a"), keys()).unwrap();
    let id_token = TestKeyPair::load().sign(&tenant_claims);
    let tokens = auth
        .get_custom_id_and_refresh_tokens(&id_token, &CustomTokensOptions::default())
        .await
        .unwrap();

    assert_eq!(decode_custom_token(&tokens.custom_token)["tenant_id"], "tenant-a");

    let requests = provider.received().await;
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["tenantId"], "tenant-a");
    assert_eq!(body["token"], tokens.custom_token);
}

#[tokio::test]
async fn test_unknown_email_verification_is_not_invented() {
    let provider = ProviderMock::start().await;
    let it2 = TestKeyPair::load().sign(&TestClaims::valid("uid-1"));
    provider.expect_custom_token_exchange(&it2, "RT2").await;

    let id_token =
        TestKeyPair::load().sign(&TestClaims::valid("uid-1").without_claim("email_verified"));
    let tokens = auth(&provider)
        .get_custom_id_and_refresh_tokens(&id_token, &CustomTokensOptions::default())
        .await
        .unwrap();

    let claims = decode_custom_token(&tokens.custom_token);
    assert!(claims["claims"].get("email_verified").is_none());
    assert_eq!(claims["claims"]["source_sign_in_provider"], "password");
}

#[tokio::test]
async fn test_rejected_sign_up_keeps_provider_payload() {
    let provider = ProviderMock::start().await;
    provider
        .reject_sign_up(400, json!({"error": {"code": 400, "message": "ADMIN_ONLY_OPERATION"}}))
        .await;

    let err = auth(&provider)
        .create_anonymous_user(&ExchangeOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::Provider { status, detail, .. } => {
            assert_eq!(status, Some(400));
            assert!(detail.contains("ADMIN_ONLY_OPERATION"));
        }
        other => panic!("Expected provider error, got: {other:?}"),
    }
}

fn decode_custom_token(token: &str) -> Value {
    let key = DecodingKey::from_rsa_pem(include_bytes!("fixtures/service_account_key.pub.pem"))
        .expect("Failed to load test public key");
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[
        "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit",
    ]);
    jsonwebtoken::decode::<Value>(token, &key, &validation)
        .expect("custom token verifies")
        .claims
}
