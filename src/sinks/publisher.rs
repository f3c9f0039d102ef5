//! Publish/subscribe topic client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::sinks::error::UpstreamError;
use crate::sinks::{check_status, endpoint_url};

/// One message for a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub topic: String,
    pub subject: String,
    /// Serialized message body.
    pub message: String,
    pub attributes: BTreeMap<String, String>,
}

/// Publishes messages to a topic and returns the transport's delivery id.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, request: PublishRequest) -> Result<String, UpstreamError>;
}

/// Topic gateway reached over HTTP: `POST {endpoint}/topics/{topic}/messages`.
#[derive(Debug, Clone)]
pub struct HttpTopicPublisher {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    message_id: String,
}

impl HttpTopicPublisher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TopicPublisher for HttpTopicPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<String, UpstreamError> {
        let url = endpoint_url(&self.endpoint, &["topics", request.topic.as_str(), "messages"])?;
        let response = self.client.post(url).json(&request).send().await?;
        let published: PublishResponse = check_status(response).await?.json().await?;
        Ok(published.message_id)
    }
}
