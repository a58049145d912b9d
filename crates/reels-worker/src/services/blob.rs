//! R2-backed blob store.

use std::path::Path;

use async_trait::async_trait;

use reels_models::JobId;
use reels_storage::{R2Client, StorageError};

use super::BlobStore;
use crate::error::{WorkerError, WorkerResult};

#[async_trait]
impl BlobStore for R2Client {
    async fn upload(&self, job_id: &JobId, local_path: &Path) -> WorkerResult<String> {
        self.upload_output(job_id.as_str(), local_path)
            .await
            .map_err(|e| WorkerError::upload_failed(e.to_string()))
    }

    async fn fetch(&self, reference: &str, dest: &Path) -> WorkerResult<()> {
        self.fetch_reference(reference, dest).await.map_err(|e| match e {
            StorageError::NotFound(key) => WorkerError::fetch_failed(format!("photo {} not found", key)),
            other => WorkerError::fetch_failed(other.to_string()),
        })
    }
}
