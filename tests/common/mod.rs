//! Shared fakes and fixtures for integration testing.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Bytes, extract::State, http::{Method, StatusCode, Uri}, routing::any, Router};
use chrono::Utc;
use serde_json::Value;
use tokio::net::TcpListener;

use webhook_fanout::deadletter::{
    DeadLetterEntry, DeadLetterQueue, FailureAnalysis, FailureArchive, FailureInfo, FailureMetrics,
    FailureRecord, FailureType,
};
use webhook_fanout::deadletter::entry::{DeadLetterAttributes, DeadLetterMetadata};
use webhook_fanout::ingest::{
    DispatchSettings, Event, FanoutMessage, InboundRequest, WebhookDispatcher,
};
use webhook_fanout::sinks::{
    DocumentStore, PublishRequest, SecretCache, SecretError, SecretSource, SecretValue,
    TopicPublisher, UpstreamError,
};

pub const STORE_SECRET: &str = "webhooks/store-uri";
pub const TOPIC: &str = "webhook-events";

/// Secret source backed by a map, counting fetches.
#[derive(Default)]
pub struct MemorySecrets {
    pub values: Mutex<HashMap<String, String>>,
    pub fetches: AtomicUsize,
    pub delay: Option<Duration>,
}

impl MemorySecrets {
    pub fn with(name: &str, value: &str) -> Self {
        let secrets = Self::default();
        secrets.values.lock().unwrap().insert(name.into(), value.into());
        secrets
    }
}

#[async_trait]
impl SecretSource for MemorySecrets {
    async fn fetch(&self, name: &str) -> Result<String, SecretError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.values
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotConfigured(name.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub connection: String,
    pub database: String,
    pub collection: String,
    pub document: Value,
}

#[derive(Default)]
pub struct MemoryStore {
    pub documents: Mutex<Vec<StoredDocument>>,
    pub fail: AtomicBool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn documents(&self) -> Vec<StoredDocument> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        connection: &SecretValue,
        database: &str,
        collection: &str,
        document: &Value,
    ) -> Result<(), UpstreamError> {
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Rejected("store unavailable".into()));
        }
        self.documents.lock().unwrap().push(StoredDocument {
            connection: connection.expose().to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            document: document.clone(),
        });
        Ok(())
    }
}

/// Publisher that records requests. Topics in `failing_topics` (or all, with `fail_all`) error.
#[derive(Default)]
pub struct MemoryPublisher {
    pub published: Mutex<Vec<PublishRequest>>,
    pub failing_topics: Mutex<HashSet<String>>,
    pub fail_all: AtomicBool,
}

impl MemoryPublisher {
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail_all.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn fail_topic(&self, topic: &str) {
        self.failing_topics.lock().unwrap().insert(topic.to_string());
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TopicPublisher for MemoryPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<String, UpstreamError> {
        tokio::task::yield_now().await;
        if self.fail_all.load(Ordering::SeqCst)
            || self.failing_topics.lock().unwrap().contains(&request.topic)
        {
            return Err(UpstreamError::Status {
                status: 503,
                body: "topic unavailable".into(),
            });
        }
        let mut published = self.published.lock().unwrap();
        published.push(request);
        Ok(format!("msg-{}", published.len()))
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    pub entries: Mutex<Vec<DeadLetterEntry>>,
    pub deleted: Mutex<Vec<String>>,
    pub failing_deletes: Mutex<HashSet<String>>,
}

impl MemoryQueue {
    pub fn with(entries: Vec<DeadLetterEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Default::default()
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.message_id.clone())
            .collect()
    }
}

#[async_trait]
impl DeadLetterQueue for MemoryQueue {
    async fn receive(&self, max: usize) -> Result<Vec<DeadLetterEntry>, UpstreamError> {
        Ok(self.entries.lock().unwrap().iter().take(max).cloned().collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), UpstreamError> {
        if self.failing_deletes.lock().unwrap().contains(receipt_handle) {
            return Err(UpstreamError::Rejected(format!("cannot delete {receipt_handle}")));
        }
        self.entries
            .lock()
            .unwrap()
            .retain(|e| e.receipt_handle != receipt_handle);
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedMetric {
    pub protocol: String,
    pub failure_type: FailureType,
    pub critical: bool,
}

#[derive(Default)]
pub struct MemoryMetrics {
    pub recorded: Mutex<Vec<RecordedMetric>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl FailureMetrics for MemoryMetrics {
    async fn record(
        &self,
        info: &FailureInfo,
        analysis: &FailureAnalysis,
    ) -> Result<(), UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Rejected("metrics backend down".into()));
        }
        self.recorded.lock().unwrap().push(RecordedMetric {
            protocol: info.protocol.clone(),
            failure_type: analysis.failure_type,
            critical: analysis.is_critical,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryArchive {
    pub records: Mutex<Vec<Value>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl FailureArchive for MemoryArchive {
    async fn archive(&self, record: &FailureRecord) -> Result<(), UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Rejected("archive bucket missing".into()));
        }
        self.records.lock().unwrap().push(serde_json::to_value(record)?);
        Ok(())
    }
}

pub fn settings(fanout_topic: Option<&str>) -> DispatchSettings {
    DispatchSettings {
        environment: "test".into(),
        database: "webhooks".into(),
        store_secret_name: STORE_SECRET.into(),
        fanout_topic: fanout_topic.map(str::to_string),
        max_headers_attribute_size: 1000,
    }
}

pub fn secret_cache(source: Arc<MemorySecrets>) -> Arc<SecretCache> {
    Arc::new(SecretCache::new(source, Duration::from_secs(300)))
}

/// Dispatcher with fan-out to [`TOPIC`].
pub fn dispatcher(store: Arc<MemoryStore>, publisher: Arc<MemoryPublisher>) -> WebhookDispatcher {
    WebhookDispatcher::new(
        settings(Some(TOPIC)),
        secret_cache(Arc::new(MemorySecrets::with(STORE_SECRET, "memory://store"))),
        store,
        Some(publisher as Arc<dyn TopicPublisher>),
    )
}

pub fn post(path: &str, body: &str) -> InboundRequest {
    request("POST", path, body)
}

pub fn request(method: &str, path: &str, body: &str) -> InboundRequest {
    InboundRequest {
        method: Some(method.into()),
        path: Some(path.into()),
        headers: BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]),
        body: Some(body.into()),
        source_ip: Some("203.0.113.7".into()),
        domain: Some("hooks.example.com".into()),
        ..Default::default()
    }
}

/// Original fan-out message body for a webhook on `path`.
pub fn original_body(path: &str) -> String {
    let mut request = post(path, r#"{"amount":10}"#);
    request.headers.insert("X-Correlation-ID".into(), "corr-dlq".into());
    let message = FanoutMessage::new("test", Event::from_request(&request));
    serde_json::to_string(&message).unwrap()
}

/// A dead-letter entry sent `age` ago.
pub fn dead_letter_entry(
    id: &str,
    path: &str,
    reason: &str,
    receive_count: u32,
    age: chrono::Duration,
) -> DeadLetterEntry {
    let sent = (Utc::now() - age).timestamp_millis();
    DeadLetterEntry {
        message_id: id.to_string(),
        body: original_body(path),
        attributes: DeadLetterAttributes {
            topic_ref: Some(TOPIC.into()),
            failure_reason: Some(reason.into()),
            endpoint: Some("https://consumer.example.com/hook".into()),
            protocol: Some("https".into()),
        },
        metadata: DeadLetterMetadata {
            approx_receive_count: receive_count,
            first_receive_timestamp: sent,
            sent_timestamp: sent,
        },
        receipt_handle: format!("rh-{id}"),
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub body: String,
}

#[derive(Clone)]
struct UpstreamState {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    status: StatusCode,
    body: &'static str,
}

/// Start a mock upstream on an ephemeral port that answers every request with
/// `status` and `body` and records what it received.
pub async fn start_mock_upstream(
    status: StatusCode,
    body: &'static str,
) -> (SocketAddr, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = UpstreamState {
        captured: captured.clone(),
        status,
        body,
    };

    async fn handle(
        State(state): State<UpstreamState>,
        method: Method,
        uri: Uri,
        body: Bytes,
    ) -> (StatusCode, &'static str) {
        state.captured.lock().unwrap().push(CapturedRequest {
            method,
            path: uri.path().to_string(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
        (state.status, state.body)
    }

    let app = Router::new()
        .route("/", any(handle))
        .route("/{*path}", any(handle))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, captured)
}
