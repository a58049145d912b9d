//! Render job repository.
//!
//! Every status/progress write is a checked read-modify-write: the stored job
//! is read, the update is validated against it, and the PATCH carries the
//! read `updateTime` as a precondition so concurrent writers cannot interleave.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use reels_models::{Job, JobId, JobStatus, JobUpdate, RenderRequest};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::{record_job_write, record_write_conflict};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

/// Top-level collection holding job documents.
pub const JOBS_COLLECTION: &str = "jobs";

/// Read-modify-write attempts before giving up on a contended job.
const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Repository for render job documents.
#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
    collection: String,
}

impl JobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self::with_collection(client, JOBS_COLLECTION)
    }

    pub fn with_collection(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Get a job by ID.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<Job>> {
        let doc = self
            .client
            .with_retry("get_job", || self.client.get_document(&self.collection, job_id.as_str()))
            .await?;

        doc.map(|d| document_to_job(&d, job_id)).transpose()
    }

    /// Persist a new job. Fails with `AlreadyExists` on id reuse.
    pub async fn create(&self, job: &Job) -> FirestoreResult<()> {
        let fields = job_to_fields(job)?;
        self.client
            .create_document(&self.collection, job.id.as_str(), fields)
            .await?;
        record_job_write(job.status.as_str());
        info!(job_id = %job.id, "Created job record");
        Ok(())
    }

    /// Apply one update atomically and return the stored job after it.
    ///
    /// The update is validated against the freshly read job, so a terminal
    /// job rejects it with [`FirestoreError::Transition`].
    pub async fn apply(&self, job_id: &JobId, update: &JobUpdate) -> FirestoreResult<Job> {
        let mut last_error = None;

        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let doc = self
                .client
                .with_retry("get_job", || self.client.get_document(&self.collection, job_id.as_str()))
                .await?
                .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", self.collection, job_id)))?;

            let mut job = document_to_job(&doc, job_id)?;
            job.apply(update)?;

            let (fields, mask) = update_fields(update, job.updated_at);
            match self
                .client
                .update_document(
                    &self.collection,
                    job_id.as_str(),
                    fields,
                    Some(mask),
                    doc.update_time.as_deref(),
                )
                .await
            {
                Ok(_) => {
                    record_job_write(job.status.as_str());
                    debug!(job_id = %job_id, status = %job.status, progress = job.progress, "Job updated");
                    return Ok(job);
                }
                Err(e) if e.is_precondition_failed() => {
                    record_write_conflict();
                    debug!(job_id = %job_id, attempt = attempt + 1, "Job changed since read, retrying");
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                }
                Err(e) if e.is_retryable() => {
                    warn!(job_id = %job_id, attempt = attempt + 1, "Job update failed, retrying: {}", e);
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(100 * (attempt as u64 + 1))).await;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(job_id = %job_id, "Job update failed after {} attempts: {:?}", MAX_WRITE_ATTEMPTS, last_error);
        Err(last_error.unwrap_or_else(|| FirestoreError::request_failed("job update attempts exhausted")))
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Full field set for a new job document.
fn job_to_fields(job: &Job) -> FirestoreResult<HashMap<String, Value>> {
    let payload = serde_json::to_value(&job.payload)?;

    let mut fields = HashMap::new();
    fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
    fields.insert("progress".to_string(), job.progress.to_firestore_value());
    fields.insert("outputUrl".to_string(), job.output_url.to_firestore_value());
    fields.insert("error".to_string(), job.error.to_firestore_value());
    fields.insert("payload".to_string(), Value::from(&payload));
    if let Some(ref user_id) = job.user_id {
        fields.insert("userId".to_string(), user_id.to_firestore_value());
    }
    fields.insert("createdAt".to_string(), job.created_at.to_firestore_value());
    fields.insert("updatedAt".to_string(), job.updated_at.to_firestore_value());
    Ok(fields)
}

/// Fields and mask for one update. Only fields the update sets are written.
fn update_fields(update: &JobUpdate, updated_at: DateTime<Utc>) -> (HashMap<String, Value>, Vec<String>) {
    let mut fields = HashMap::new();
    fields.insert("status".to_string(), update.status.as_str().to_firestore_value());
    fields.insert("updatedAt".to_string(), updated_at.to_firestore_value());

    if let Some(progress) = update.progress {
        fields.insert("progress".to_string(), progress.to_firestore_value());
    }
    if let Some(ref url) = update.output_url {
        fields.insert("outputUrl".to_string(), url.to_firestore_value());
    }
    if let Some(ref message) = update.error {
        fields.insert("error".to_string(), message.to_firestore_value());
    }

    let mut mask: Vec<String> = fields.keys().cloned().collect();
    mask.sort();
    (fields, mask)
}

fn document_to_job(doc: &Document, job_id: &JobId) -> FirestoreResult<Job> {
    let status: JobStatus = doc
        .get::<String>("status")
        .ok_or_else(|| FirestoreError::invalid_response(format!("job {} has no status", job_id)))?
        .parse()
        .map_err(|e| FirestoreError::invalid_response(format!("job {}: {}", job_id, e)))?;

    let payload_value = doc
        .field("payload")
        .ok_or_else(|| FirestoreError::invalid_response(format!("job {} has no payload", job_id)))?;
    let payload: RenderRequest = serde_json::from_value(payload_value.to_json())?;

    let created_at = doc.get::<DateTime<Utc>>("createdAt").unwrap_or_else(Utc::now);

    Ok(Job {
        id: job_id.clone(),
        status,
        progress: doc.get::<u8>("progress").unwrap_or(0),
        output_url: doc.get("outputUrl"),
        error: doc.get("error"),
        payload,
        user_id: doc.get("userId"),
        created_at,
        updated_at: doc.get("updatedAt").unwrap_or(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reels_models::{Checkpoint, StylePreset};

    fn sample_job() -> Job {
        let payload = RenderRequest::new(
            "Big Sur",
            "Cliffside cabin with ocean views",
            vec!["gs://reels-uploads/p1.jpg".into(), "gs://reels-uploads/p2.jpg".into()],
            StylePreset::Hybrid,
        )
        .with_voice("rachel");
        Job::new(JobId::from_string("job-7"), payload).with_user("user-1")
    }

    fn stored(job: &Job) -> Document {
        let mut doc = Document::new(job_to_fields(job).unwrap());
        doc.update_time = Some("2026-03-01T10:00:00.000001Z".into());
        doc
    }

    #[test]
    fn test_fields_roundtrip_through_document() {
        let job = sample_job();
        let decoded = document_to_job(&stored(&job), &job.id).unwrap();

        assert_eq!(decoded.status, JobStatus::Queued);
        assert_eq!(decoded.payload, job.payload);
        assert_eq!(decoded.user_id.as_deref(), Some("user-1"));
        assert!(decoded.output_url.is_none());
        assert!(decoded.error.is_none());
        assert_eq!(decoded.created_at.timestamp(), job.created_at.timestamp());
    }

    #[test]
    fn test_new_job_stores_explicit_nulls() {
        let fields = job_to_fields(&sample_job()).unwrap();
        assert_eq!(fields["outputUrl"], Value::NullValue(()));
        assert_eq!(fields["error"], Value::NullValue(()));
        assert_eq!(fields["progress"], Value::IntegerValue("0".into()));
    }

    #[test]
    fn test_checkpoint_update_masks_only_touched_fields() {
        let (fields, mask) = update_fields(&JobUpdate::checkpoint(Checkpoint::VoiceReady), Utc::now());
        assert_eq!(mask, vec!["progress", "status", "updatedAt"]);
        assert_eq!(fields["progress"], Value::IntegerValue("25".into()));
    }

    #[test]
    fn test_failure_update_leaves_progress_alone() {
        let (fields, mask) = update_fields(&JobUpdate::failed("encode failed"), Utc::now());
        assert_eq!(mask, vec!["error", "status", "updatedAt"]);
        assert_eq!(fields["status"], Value::StringValue("error".into()));
    }

    #[test]
    fn test_done_update_sets_url() {
        let (_, mask) = update_fields(&JobUpdate::done("https://cdn/users/job-7/reel.mp4"), Utc::now());
        assert_eq!(mask, vec!["outputUrl", "progress", "status", "updatedAt"]);
    }

    #[test]
    fn test_missing_status_is_invalid() {
        let mut doc = stored(&sample_job());
        doc.fields.as_mut().unwrap().remove("status");
        assert!(matches!(
            document_to_job(&doc, &JobId::from_string("job-7")),
            Err(FirestoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_terminal_document_rejects_update() {
        let mut job = sample_job();
        job.apply(&JobUpdate::start()).unwrap();
        job.apply(&JobUpdate::done("https://cdn/reel.mp4")).unwrap();

        let mut decoded = document_to_job(&stored(&job), &job.id).unwrap();
        let err: FirestoreError = decoded.apply(&JobUpdate::start()).unwrap_err().into();
        assert!(matches!(err, FirestoreError::Transition(_)));
    }
}
