//! HTTP collaborator adapters against a mock upstream.

use axum::http::{Method, StatusCode};
use serde_json::json;
use webhook_fanout::sinks::{
    DocumentStore, HttpDocumentStore, HttpSecretSource, HttpTopicPublisher, PublishRequest,
    SecretError, SecretSource, SecretValue, TopicPublisher, UpstreamError,
};

mod common;

#[tokio::test]
async fn test_document_store_posts_to_collection() {
    let (addr, captured) = common::start_mock_upstream(StatusCode::CREATED, "{}").await;
    let store = HttpDocumentStore::new(reqwest::Client::new());
    let connection = SecretValue::new(format!("http://{addr}/store"));

    store
        .insert(&connection, "webhooks", "messages-telegram", &json!({"a": 1}))
        .await
        .unwrap();

    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/store/webhooks/messages-telegram");
    assert_eq!(requests[0].body, r#"{"a":1}"#);
}

#[tokio::test]
async fn test_document_store_reports_upstream_status() {
    let (addr, _) =
        common::start_mock_upstream(StatusCode::SERVICE_UNAVAILABLE, "overloaded").await;
    let store = HttpDocumentStore::new(reqwest::Client::new());
    let connection = SecretValue::new(format!("http://{addr}"));

    let err = store
        .insert(&connection, "webhooks", "root", &json!({}))
        .await
        .unwrap_err();

    match err {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_document_store_hides_bad_connection_string() {
    let store = HttpDocumentStore::new(reqwest::Client::new());
    let err = store
        .insert(&SecretValue::new("user:pass@nowhere"), "webhooks", "root", &json!({}))
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("pass"));
}

#[tokio::test]
async fn test_topic_publisher_returns_delivery_id() {
    let (addr, captured) =
        common::start_mock_upstream(StatusCode::OK, r#"{"messageId":"abc-1"}"#).await;
    let publisher = HttpTopicPublisher::new(reqwest::Client::new(), format!("http://{addr}"));

    let delivery_id = publisher
        .publish(PublishRequest {
            topic: "webhook-events".into(),
            subject: "Webhook Event - POST /orders".into(),
            message: "{}".into(),
            attributes: [("environment".to_string(), "test".to_string())].into(),
        })
        .await
        .unwrap();

    assert_eq!(delivery_id, "abc-1");
    let requests = captured.lock().unwrap();
    assert_eq!(requests[0].path, "/topics/webhook-events/messages");
    let sent: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(sent["subject"], "Webhook Event - POST /orders");
    assert_eq!(sent["attributes"]["environment"], "test");
}

#[tokio::test]
async fn test_secret_source_reads_parameter() {
    let (addr, captured) =
        common::start_mock_upstream(StatusCode::OK, r#"{"value":"mongodb://db"}"#).await;
    let source = HttpSecretSource::new(reqwest::Client::new(), format!("http://{addr}/"));

    assert_eq!(source.fetch("webhooks/store-uri").await.unwrap(), "mongodb://db");
    assert_eq!(captured.lock().unwrap()[0].path, "/parameters/webhooks%2Fstore-uri");
}

#[tokio::test]
async fn test_secret_source_missing_parameter_is_not_configured() {
    let (addr, _) = common::start_mock_upstream(StatusCode::NOT_FOUND, "").await;
    let source = HttpSecretSource::new(reqwest::Client::new(), format!("http://{addr}"));

    assert!(matches!(
        source.fetch("webhooks/store-uri").await,
        Err(SecretError::NotConfigured(name)) if name == "webhooks/store-uri"
    ));
}

#[tokio::test]
async fn test_secret_source_upstream_failure() {
    let (addr, _) = common::start_mock_upstream(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
    let source = HttpSecretSource::new(reqwest::Client::new(), format!("http://{addr}"));

    assert!(matches!(
        source.fetch("store").await,
        Err(SecretError::Upstream { source: UpstreamError::Status { status: 500, .. }, .. })
    ));
}
