//! Durable document store.

use async_trait::async_trait;
use serde_json::Value;

use crate::sinks::error::UpstreamError;
use crate::sinks::secrets::SecretValue;
use crate::sinks::{check_status, endpoint_url};

/// Durable write of one document into a named collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist `document` into `database`/`collection`. Success or failure only.
    async fn insert(
        &self,
        connection: &SecretValue,
        database: &str,
        collection: &str,
        document: &Value,
    ) -> Result<(), UpstreamError>;
}

/// Document store reached over HTTP.
///
/// The connection secret is the store's base URI; documents are written with
/// `POST {connection}/{database}/{collection}`.
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
}

impl HttpDocumentStore {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn insert(
        &self,
        connection: &SecretValue,
        database: &str,
        collection: &str,
        document: &Value,
    ) -> Result<(), UpstreamError> {
        // The URI may carry credentials; report a redacted endpoint on parse failure.
        let url = endpoint_url(connection.expose(), &[database, collection])
            .map_err(|_| UpstreamError::Endpoint("<store connection secret>".to_string()))?;

        let response = self.client.post(url).json(document).send().await?;
        check_status(response).await?;
        Ok(())
    }
}
