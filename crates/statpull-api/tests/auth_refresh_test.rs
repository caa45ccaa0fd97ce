#![allow(clippy::unwrap_used)]
// Token refresh behaviour shared by both clients, against wiremock.

use std::time::Duration;

use chrono::{Local, TimeDelta};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use statpull_api::{
    AnalyticsClient, AppCredentials, Error, GaEndpoints, TokenBundle, YandexClient,
    YandexEndpoints,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn app() -> AppCredentials {
    AppCredentials {
        client_id: "cid".into(),
        client_secret: "csecret".to_string().into(),
        callback_url: None,
    }
}

fn bundle_expiring_in(ttl: TimeDelta) -> TokenBundle {
    TokenBundle {
        access_token: SecretString::from("stale".to_owned()),
        refresh_token: Some(SecretString::from("refresh-1".to_owned())),
        expired_at: Some(Local::now().naive_local() + ttl),
        expires_in: None,
        token_type: None,
    }
}

async fn mount_token(server: &MockServer, token_path: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(token_path))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

async fn ga_client(server: &MockServer, bundle: TokenBundle) -> Result<AnalyticsClient, Error> {
    let base = Url::parse(&server.uri()).unwrap();
    AnalyticsClient::with_client(
        reqwest::Client::new(),
        Duration::from_secs(5),
        GaEndpoints::under(&base).unwrap(),
        app(),
        bundle,
    )
    .await
}

async fn ya_client(server: &MockServer, bundle: TokenBundle) -> Result<YandexClient, Error> {
    let base = Url::parse(&server.uri()).unwrap();
    YandexClient::with_client(
        reqwest::Client::new(),
        Duration::from_secs(5),
        YandexEndpoints::under(&base).unwrap(),
        app(),
        Some(bundle),
    )
    .await
}

// ── Google ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ga_refreshes_expired_token_before_first_request() {
    let server = MockServer::start().await;
    mount_token(
        &server,
        "/token",
        200,
        json!({"access_token": "fresh", "expires_in": 3599, "token_type": "Bearer"}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/analytics/v3/management/accountSummaries"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ga_client(&server, bundle_expiring_in(TimeDelta::minutes(-1)))
        .await
        .unwrap();
    client.account_summaries().await.unwrap();

    let bundle = client.credentials().await;
    assert_eq!(bundle.access_token.expose_secret(), "fresh");
    // Google does not return a new refresh token; the old one is kept.
    assert_eq!(bundle.refresh_token.unwrap().expose_secret(), "refresh-1");
}

#[tokio::test]
async fn test_ga_token_outside_margin_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = ga_client(&server, bundle_expiring_in(TimeDelta::minutes(30)))
        .await
        .unwrap();
    assert_eq!(client.credentials().await.access_token.expose_secret(), "stale");
}

#[tokio::test]
async fn test_revoked_refresh_token_fails_construction() {
    let server = MockServer::start().await;
    mount_token(
        &server,
        "/token",
        400,
        json!({"error": "invalid_grant", "error_description": "Token has been revoked."}),
    )
    .await;

    let err = ga_client(&server, bundle_expiring_in(TimeDelta::zero()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::CredentialsRevoked { .. }), "got: {err:?}");
    assert!(err.is_auth_expired());
}

#[tokio::test]
async fn test_other_refresh_failure_is_expired() {
    let server = MockServer::start().await;
    mount_token(&server, "/token", 500, json!({"error": "backend"})).await;

    let err = ga_client(&server, bundle_expiring_in(TimeDelta::zero()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::CredentialsExpired { .. }), "got: {err:?}");
}

// ── Yandex ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_yandex_refreshes_inside_ten_hour_margin() {
    let server = MockServer::start().await;
    mount_token(
        &server,
        "/oauth/token",
        200,
        json!({
            "access_token": "ya-fresh",
            "refresh_token": "refresh-2",
            "expires_in": 31_536_000,
            "token_type": "bearer"
        }),
    )
    .await;

    // Five hours left is inside the ten-hour margin.
    let client = ya_client(&server, bundle_expiring_in(TimeDelta::hours(5)))
        .await
        .unwrap();
    let bundle = client.credentials().await.unwrap();
    assert_eq!(bundle.access_token.expose_secret(), "ya-fresh");
    assert_eq!(bundle.refresh_token.unwrap().expose_secret(), "refresh-2");
    assert!(bundle.expired_at.unwrap() > Local::now().naive_local() + TimeDelta::days(300));
}

#[tokio::test]
async fn test_yandex_token_outside_margin_is_kept() {
    let server = MockServer::start().await;

    let client = ya_client(&server, bundle_expiring_in(TimeDelta::hours(11)))
        .await
        .unwrap();
    let bundle = client.credentials().await.unwrap();
    assert_eq!(bundle.access_token.expose_secret(), "stale");
    assert!(server.received_requests().await.unwrap().is_empty());
}
