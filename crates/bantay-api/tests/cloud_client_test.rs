// Integration tests for `RestCloudClient` using wiremock.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bantay_api::{CloudBackend, Error, RestCloudClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(api_key: Option<&str>) -> (MockServer, RestCloudClient) {
    let server = MockServer::start().await;
    let client = RestCloudClient::from_reqwest(
        &server.uri(),
        reqwest::Client::new(),
        api_key.map(|k| SecretString::from(k.to_owned())),
    )
    .unwrap();
    (server, client)
}

// ── Telemetry ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_latest_telemetry() {
    let (server, client) = setup(Some("s3cret")).await;

    Mock::given(method("GET"))
        .and(path("/sensor_data/main_001"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "motion": 1,
            "dhtTemperature": 29.5,
            "dhtHumidity": 71.0
        })))
        .mount(&server)
        .await;

    let doc = tokio_test::assert_ok!(client.latest_telemetry("main_001").await).unwrap();
    assert_eq!(doc["motion"], 1);
    assert_eq!(doc["dhtTemperature"], 29.5);
}

#[tokio::test]
async fn test_latest_telemetry_missing_document() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/sensor_data/main_001"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.latest_telemetry("main_001").await.unwrap().is_none());
}

#[tokio::test]
async fn test_latest_telemetry_bad_body() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/sensor_data/main_001"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client.latest_telemetry("main_001").await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "<html>"));
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_command_queues_pending_document() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/commands/main_001/pending"))
        .and(body_partial_json(json!({
            "action": "play_audio",
            "params": { "track": 3 },
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let id = client
        .send_command("main_001", "play_audio", json!({ "track": 3 }))
        .await
        .unwrap();
    assert!(uuid::Uuid::parse_str(&id).is_ok());
}

#[tokio::test]
async fn test_send_command_server_error() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/commands/camera_001/pending"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client
        .send_command("camera_001", "capture_image", json!({}))
        .await
        .unwrap_err();
    match err {
        Error::CloudApi { status, ref message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_base_url_with_trailing_slash() {
    let server = MockServer::start().await;
    let client = RestCloudClient::from_reqwest(
        &format!("{}/", server.uri()),
        reqwest::Client::new(),
        None,
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/sensor_data/main_001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "motion": 0 })))
        .mount(&server)
        .await;

    assert!(client.latest_telemetry("main_001").await.unwrap().is_some());
}
