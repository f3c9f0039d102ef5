//! Dead-letter transport.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::deadletter::entry::DeadLetterEntry;
use crate::sinks::error::UpstreamError;

/// Source of failed deliveries. The transport owns in-flight state;
/// an entry disappears only when deleted by its receipt handle.
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    /// Receive up to `max` entries, in delivery order.
    async fn receive(&self, max: usize) -> Result<Vec<DeadLetterEntry>, UpstreamError>;

    /// Remove an entry. Deleting an unknown handle succeeds.
    async fn delete(&self, receipt_handle: &str) -> Result<(), UpstreamError>;
}

/// Dead-letter queue backed by a JSON array file.
///
/// Every receive bumps `approxReceiveCount` on the returned entries and writes
/// the file back, so repeated runs observe growing counts like a real transport.
#[derive(Debug)]
pub struct FileDeadLetterQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileDeadLetterQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<DeadLetterEntry>, UpstreamError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entries: &[DeadLetterEntry]) -> Result<(), UpstreamError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl DeadLetterQueue for FileDeadLetterQueue {
    async fn receive(&self, max: usize) -> Result<Vec<DeadLetterEntry>, UpstreamError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.is_empty() || max == 0 {
            return Ok(Vec::new());
        }

        let count = max.min(entries.len());
        for entry in entries.iter_mut().take(count) {
            let received = &mut entry.metadata.approx_receive_count;
            *received = received.saturating_add(1);
        }
        self.store(&entries).await?;

        entries.truncate(count);
        Ok(entries)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), UpstreamError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|entry| entry.receipt_handle != receipt_handle);
        if entries.len() != before {
            self.store(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadletter::entry::{DeadLetterAttributes, DeadLetterMetadata};

    fn entry(id: &str) -> DeadLetterEntry {
        DeadLetterEntry {
            message_id: id.to_string(),
            body: "{}".to_string(),
            attributes: DeadLetterAttributes::default(),
            metadata: DeadLetterMetadata::default(),
            receipt_handle: format!("rh-{id}"),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dlq-{name}-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let queue = FileDeadLetterQueue::new(temp_path("missing"));
        assert!(queue.receive(10).await.unwrap().is_empty());
        queue.delete("rh-x").await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_bumps_count_and_delete_is_idempotent() {
        let path = temp_path("roundtrip");
        let seeded = vec![entry("a"), entry("b"), entry("c")];
        tokio::fs::write(&path, serde_json::to_vec(&seeded).unwrap()).await.unwrap();
        let queue = FileDeadLetterQueue::new(&path);

        let first = queue.receive(2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].message_id, "a");
        assert_eq!(first[0].metadata.approx_receive_count, 1);

        let second = queue.receive(10).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].metadata.approx_receive_count, 2);
        assert_eq!(second[2].metadata.approx_receive_count, 1);

        queue.delete("rh-a").await.unwrap();
        queue.delete("rh-a").await.unwrap();
        let remaining = queue.receive(10).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].message_id, "b");

        let _ = tokio::fs::remove_file(&path).await;
    }
}
