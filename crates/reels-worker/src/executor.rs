//! Queue executor: feeds render tasks from Redis Streams into the pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reels_models::{JobStatus, RenderTask};
use reels_queue::RenderQueue;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{RenderOutcome, RenderPipeline};

/// What to do with a delivery after the pipeline returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Finished one way or another; remove it from the stream.
    Ack,
    /// Leave it pending so it is redelivered.
    Retry,
    /// Give up and park it in the dead letter stream.
    DeadLetter,
}

/// Whether the delivery should be seen again later.
///
/// Transient store and queue failures qualify, and so does a job another
/// delivery is still rendering: a later attempt either finds it terminal or
/// closes it out as abandoned.
fn awaits_redelivery(result: &WorkerResult<RenderOutcome>) -> bool {
    match result {
        Ok(RenderOutcome::Skipped {
            status: JobStatus::Rendering,
            ..
        }) => true,
        Ok(_) => false,
        Err(e) => e.is_retryable(),
    }
}

/// Decide a delivery's fate from the pipeline result and its retry count.
pub fn disposition(result: &WorkerResult<RenderOutcome>, attempts: u32, max_retries: u32) -> Disposition {
    if !awaits_redelivery(result) {
        // Missing jobs and rejected writes will not change on redelivery
        return Disposition::Ack;
    }
    if attempts < max_retries {
        Disposition::Retry
    } else {
        Disposition::DeadLetter
    }
}

/// Job executor that processes render tasks from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<RenderQueue>,
    pipeline: Arc<RenderPipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: RenderQueue, pipeline: RenderPipeline) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("renderer-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            pipeline: Arc::new(pipeline),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Handle that stops [`JobExecutor::run`] when `true` is sent.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Consume until shutdown, then wait for in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let claim_task = self.spawn_claimer();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_tasks() => {
                    if let Err(e) = result {
                        error!("Error consuming tasks: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!("Shutdown timeout elapsed with jobs still running");
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Periodically claim deliveries abandoned by crashed workers.
    fn spawn_claimer(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let available = semaphore.available_permits();
                if available == 0 {
                    continue;
                }
                match queue.claim_pending(&consumer_name, min_idle_ms, available).await {
                    Ok(tasks) if !tasks.is_empty() => {
                        info!("Claimed {} pending render tasks", tasks.len());
                        for (message_id, task) in tasks {
                            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                return;
                            };
                            let queue = Arc::clone(&queue);
                            let pipeline = Arc::clone(&pipeline);
                            tokio::spawn(async move {
                                let _permit = permit;
                                Self::execute_task(pipeline, queue, message_id, task).await;
                            });
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to claim pending tasks: {}", e),
                }
            }
        })
    }

    async fn consume_tasks(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let tasks = self.queue.consume(&self.consumer_name, 1000, available).await?;
        if tasks.is_empty() {
            return Ok(());
        }
        debug!("Consumed {} render tasks", tasks.len());

        for (message_id, task) in tasks {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::config_error("job semaphore closed"))?;
            let queue = Arc::clone(&self.queue);
            let pipeline = Arc::clone(&self.pipeline);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_task(pipeline, queue, message_id, task).await;
            });
        }

        Ok(())
    }

    async fn execute_task(
        pipeline: Arc<RenderPipeline>,
        queue: Arc<RenderQueue>,
        message_id: String,
        task: RenderTask,
    ) {
        let job_id = task.job_id.clone();
        let result = pipeline.run(&job_id).await;

        let attempts = if awaits_redelivery(&result) {
            queue.increment_retry(&message_id).await.unwrap_or(u32::MAX)
        } else {
            0
        };

        match disposition(&result, attempts, queue.max_retries()) {
            Disposition::Ack => {
                match &result {
                    Ok(outcome) => debug!(job_id = %job_id, ?outcome, "Render task handled"),
                    Err(e) => warn!(job_id = %job_id, "Dropping render task: {}", e),
                }
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, "Failed to ack render task: {}", e);
                }
                if let Err(e) = queue.clear_dedup(&task).await {
                    warn!(job_id = %job_id, "Failed to clear dedup key: {}", e);
                }
            }
            Disposition::Retry => {
                info!(
                    job_id = %job_id,
                    "Render task will be retried (attempt {}/{})",
                    attempts,
                    queue.max_retries()
                );
            }
            Disposition::DeadLetter => {
                let reason = match result {
                    Err(e) => e.to_string(),
                    Ok(_) => "job still rendering under another delivery".to_string(),
                };
                if let Err(e) = queue.dlq(&message_id, &task, &reason).await {
                    error!(job_id = %job_id, "Failed to move render task to DLQ: {}", e);
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
