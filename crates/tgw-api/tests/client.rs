//! Integration tests for `TgtgClient` against wiremock HTTP mocks.

use std::sync::Arc;

use serde_json::json;
use tgw_api::{Credentials, Origin, TgtgClient};
use tgw_core::{
    errors::Error,
    ports::SnapshotSource,
    session::{Session, SessionStore},
    store::{builtin_defaults, ConfigStore},
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, store: Arc<ConfigStore>) -> TgtgClient {
    TgtgClient::new(
        base_url,
        Credentials {
            email: Some("me@example.com".into()),
            password: Some("hunter2".into()),
        },
        Origin {
            latitude: 52.5,
            longitude: 13.4,
            radius_km: 15,
        },
        store,
    )
}

fn listing() -> serde_json::Value {
    json!({
        "items": [
            {
                "item": {"item_id": "42", "price_including_taxes": {"code": "EUR", "minor_units": 300, "decimals": 2}},
                "store": {"store_id": "7", "store_name": "Bakery"},
                "display_name": "Bakery (Magic Bag)",
                "items_available": 2
            },
            {"item": {}, "display_name": "no id"}
        ]
    })
}

fn stored_session(store: &Arc<ConfigStore>, access: &str, refresh: &str) {
    SessionStore::new(store.clone())
        .save(&Session {
            user_id: Some("u1".into()),
            access_token: Some(access.into()),
            refresh_token: Some(refresh.into()),
        })
        .expect("save session");
}

#[tokio::test]
async fn logs_in_by_email_then_lists_favorites() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/loginByEmail"))
        .and(body_partial_json(json!({
            "device_type": "UNKNOWN",
            "email": "me@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc-1",
            "refresh_token": "ref-1",
            "startup_data": {"user": {"user_id": 991}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/item/v5/"))
        .and(header("authorization", "Bearer acc-1"))
        .and(header("accept-language", "en-US"))
        .and(body_partial_json(json!({
            "favorites_only": true,
            "origin": {"latitude": 52.5, "longitude": 13.4},
            "radius": 15,
            "user_id": "991"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
    let client = test_client(&server.uri(), store.clone());

    let records = client.fetch_favorites().await.expect("favorites");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_id.as_str(), "42");
    assert_eq!(records[0].items_available, 2);

    let session = SessionStore::new(store).load();
    assert_eq!(session.user_id.as_deref(), Some("991"));
    assert_eq!(session.access_token.as_deref(), Some("acc-1"));
    assert_eq!(session.refresh_token.as_deref(), Some("ref-1"));
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_listing_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/item/v5/"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token/refresh"))
        .and(body_partial_json(json!({"refresh_token": "ref-old"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "ref-new"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/item/v5/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
    stored_session(&store, "stale", "ref-old");
    let client = test_client(&server.uri(), store.clone());

    let records = client.fetch_favorites().await.expect("favorites after refresh");
    assert_eq!(records.len(), 1);

    let session = SessionStore::new(store).load();
    assert_eq!(session.user_id.as_deref(), Some("u1"));
    assert_eq!(session.access_token.as_deref(), Some("fresh"));
    assert_eq!(session.refresh_token.as_deref(), Some("ref-new"));
}

#[tokio::test]
async fn rejected_refresh_falls_back_to_email_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/loginByEmail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc-2",
            "refresh_token": "ref-2",
            "startup_data": {"user": {"user_id": "u2"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
    stored_session(&store, "stale", "ref-old");
    let client = test_client(&server.uri(), store);

    let session = client.login().await.expect("login");
    assert_eq!(session.access_token.as_deref(), Some("acc-2"));
    assert_eq!(session.user_id.as_deref(), Some("u2"));
}

#[tokio::test]
async fn failed_login_is_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/loginByEmail"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
    let client = test_client(&server.uri(), store);

    let err = client.fetch_favorites().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn server_errors_are_external() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/item/v5/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
    stored_session(&store, "acc", "ref");
    let client = test_client(&server.uri(), store);

    let err = client.fetch_favorites().await.unwrap_err();
    assert!(matches!(err, Error::External(_)), "got {err:?}");
}

#[tokio::test]
async fn stored_headers_are_sent_with_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/item/v5/"))
        .and(header("user-agent", "TGTG/24.1.0 Android"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
    store
        .set("api.headers", json!({"User-Agent": "TGTG/24.1.0 Android"}))
        .expect("set headers");
    stored_session(&store, "acc", "ref");
    let client = test_client(&server.uri(), store);

    assert!(client.fetch_favorites().await.expect("favorites").is_empty());
}

#[tokio::test]
async fn missing_credentials_fail_without_network() {
    let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
    let client = TgtgClient::new(
        "http://127.0.0.1:9/",
        Credentials {
            email: None,
            password: None,
        },
        Origin {
            latitude: 0.0,
            longitude: 0.0,
            radius_km: 15,
        },
        store,
    );

    let err = client.login_by_email().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}
