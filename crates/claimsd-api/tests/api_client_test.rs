#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use futures_util::StreamExt;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use claimsd_api::{ApiClient, ClaimValue, Endpoint, Error, EVENT_CLAIMS_UPDATED, EVENT_HELLO};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let base: Url = server.uri().parse().unwrap();
    let endpoint = Endpoint::select(Some(&base)).unwrap();
    let client = ApiClient::new(endpoint, None).unwrap();
    (server, client)
}

// ── Fetch tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_product_claims() {
    let (server, client) = setup().await;

    let body = json!({
        "trusted": true,
        "offline": false,
        "products": {
            "groupware": {
                "ok": true,
                "claims": { "seats": 25, "edition": "pro" }
            }
        }
    });

    Mock::given(method("GET"))
        .and(path("/api/v1/claims/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let snapshot = client.fetch_product_claims(None).await.unwrap();

    assert!(snapshot.trusted);
    assert!(!snapshot.offline);
    let product = &snapshot.products["groupware"];
    assert!(product.ok);
    assert_eq!(product.claims["seats"], ClaimValue::Int(25));
}

#[tokio::test]
async fn test_fetch_product_claims_with_filter() {
    let (server, client) = setup().await;

    let body = json!({ "trusted": true, "offline": false, "products": {} });

    Mock::given(method("GET"))
        .and(path("/api/v1/claims/products"))
        .and(query_param("product", "groupware"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    client.fetch_product_claims(Some("groupware")).await.unwrap();
}

#[tokio::test]
async fn test_fetch_claims_opaque_payload() {
    let (server, client) = setup().await;

    let body = json!({ "sub": "customer-1", "plan": "enterprise" });

    Mock::given(method("GET"))
        .and(path("/api/v1/claims"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let claims = client.fetch_claims().await.unwrap();
    assert_eq!(claims.dump()["plan"], "enterprise");
}

#[tokio::test]
async fn test_fetch_non_success_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/claims/products"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.fetch_product_claims(None).await.unwrap_err();
    match err {
        Error::Api { status, ref body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
            assert!(err.is_transient());
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/claims/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client.fetch_product_claims(None).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}

// ── Subscription tests ──────────────────────────────────────────────

#[tokio::test]
async fn test_subscribe_yields_events_then_ends() {
    let (server, client) = setup().await;

    let stream_body = concat!(
        "event: hello\n",
        "data: {}\n",
        "\n",
        "event: claims-updated\n",
        "data: {\"seq\": 1}\n",
        "\n",
    );

    Mock::given(method("GET"))
        .and(path("/api/v1/claims/watch"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(stream_body),
        )
        .mount(&server)
        .await;

    let mut stream = Box::pin(client.subscribe(None));

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.event_type, EVENT_HELLO);

    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.event_type, EVENT_CLAIMS_UPDATED);
    assert_eq!(second.data, "{\"seq\": 1}");

    // Server closed the response body: clean stream end.
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_subscribe_non_success_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/claims/watch"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut stream = Box::pin(client.subscribe(None));
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));
}
