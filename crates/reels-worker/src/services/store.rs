//! Job store implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use reels_firestore::{FirestoreError, JobRepository};
use reels_models::{Job, JobId, JobUpdate};

use super::JobStore;
use crate::error::{WorkerError, WorkerResult};

#[async_trait]
impl JobStore for JobRepository {
    async fn get(&self, job_id: &JobId) -> WorkerResult<Option<Job>> {
        Ok(JobRepository::get(self, job_id).await?)
    }

    async fn create(&self, job: &Job) -> WorkerResult<()> {
        Ok(JobRepository::create(self, job).await?)
    }

    async fn update(&self, job_id: &JobId, update: &JobUpdate) -> WorkerResult<Job> {
        JobRepository::apply(self, job_id, update).await.map_err(|e| match e {
            FirestoreError::NotFound(_) => WorkerError::JobNotFound(job_id.clone()),
            other => other.into(),
        })
    }
}

/// In-process job store with the same transition checks as the durable one.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    writes: Mutex<Vec<(JobId, JobUpdate)>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a job, replacing any with the same id.
    pub async fn insert(&self, job: Job) {
        self.jobs.lock().await.insert(job.id.clone(), job);
    }

    /// Every accepted update in write order.
    pub async fn writes(&self) -> Vec<(JobId, JobUpdate)> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, job_id: &JobId) -> WorkerResult<Option<Job>> {
        Ok(self.jobs.lock().await.get(job_id).cloned())
    }

    async fn create(&self, job: &Job) -> WorkerResult<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(WorkerError::store(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update(&self, job_id: &JobId, update: &JobUpdate) -> WorkerResult<Job> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))?;
        job.apply(update)?;
        self.writes.lock().await.push((job_id.clone(), update.clone()));
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reels_models::{Checkpoint, JobStatus, RenderRequest, StylePreset};

    fn job() -> Job {
        Job::new(
            JobId::from_string("job-1"),
            RenderRequest::new("Aspen", "Ski-in chalet", vec!["a.jpg".into()], StylePreset::Classic),
        )
    }

    #[tokio::test]
    async fn test_memory_store_enforces_transitions() {
        let store = MemoryJobStore::new();
        store.insert(job()).await;
        let id = JobId::from_string("job-1");

        store.update(&id, &JobUpdate::start()).await.unwrap();
        store.update(&id, &JobUpdate::checkpoint(Checkpoint::ScriptReady)).await.unwrap();
        let done = store.update(&id, &JobUpdate::done("https://cdn/reel.mp4")).await.unwrap();
        assert_eq!(done.status, JobStatus::Done);

        let err = store.update(&id, &JobUpdate::failed("late")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Transition(_)));
        assert_eq!(store.writes().await.len(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_unknown_job() {
        let store = MemoryJobStore::new();
        let err = store
            .update(&JobId::from_string("nope"), &JobUpdate::start())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_create() {
        let store = MemoryJobStore::new();
        store.create(&job()).await.unwrap();
        assert!(store.create(&job()).await.is_err());
    }
}
