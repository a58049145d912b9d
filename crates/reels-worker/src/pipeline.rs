//! Render pipeline: drives one job from `queued` to a terminal state.
//!
//! Stages run strictly in order: script, voice, accent clip, graph build and
//! encode, publish. Script failures fall back to a templated script and accent
//! failures drop the clip; every other failure is fatal. Whatever happens after
//! the job is started, a terminal `done` or `error` write follows, and the
//! scratch directory is removed only after it.
//!
//! The terminal write retries transient store failures. A run dropped before
//! that write (client disconnect, shutdown) records `error` from a drop
//! guard, and a `rendering` job silent for longer than the job
//! timeout is treated as abandoned by the next delivery and closed as `error`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{warn, Instrument};

use reels_media::{accent_placement, build_graph, GraphSpec};
use reels_models::{Checkpoint, Job, JobId, JobStatus, JobUpdate};

use crate::config::RenderConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics::{record_fallback, record_render, record_stage};
use crate::scratch::ScratchDir;
use crate::services::{
    fallback_script, AccentGenerator, BlobStore, Encoder, JobStore, ScriptGenerator, VoiceSynthesizer,
};

/// Attempts at a terminal write before the delivery is handed back.
const TERMINAL_WRITE_ATTEMPTS: u32 = 5;
const TERMINAL_WRITE_BACKOFF: Duration = Duration::from_millis(200);

/// Slack past the job timeout before a silent `rendering` job counts as abandoned.
const ABANDON_GRACE: Duration = Duration::from_secs(60);

const CANCELLED_MESSAGE: &str = "Render cancelled before completion";

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct PipelineServices {
    pub store: Arc<dyn JobStore>,
    pub script: Arc<dyn ScriptGenerator>,
    pub voice: Arc<dyn VoiceSynthesizer>,
    /// `None` disables accent clips regardless of configuration
    pub accent: Option<Arc<dyn AccentGenerator>>,
    pub encoder: Arc<dyn Encoder>,
    pub blob: Arc<dyn BlobStore>,
}

/// Result of handling one task delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Rendered and published; the job is `done`.
    Completed { output_url: String },
    /// A fatal stage failure was recorded; the job is `error`.
    Failed { error: String },
    /// The job was not `queued`, so nothing ran.
    Skipped {
        status: JobStatus,
        output_url: Option<String>,
    },
}

pub struct RenderPipeline {
    config: RenderConfig,
    services: PipelineServices,
    work_dir: PathBuf,
    job_timeout: Option<Duration>,
    abandon_after: Option<Duration>,
}

impl RenderPipeline {
    pub fn new(config: RenderConfig, services: PipelineServices, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            services,
            work_dir: work_dir.into(),
            job_timeout: None,
            abandon_after: None,
        }
    }

    /// Bound the stages of one job. Expiry is a fatal failure.
    ///
    /// Also lets a delivery close out a `rendering` job whose owner has not
    /// written anything for the timeout plus a grace period.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self.abandon_after = Some(timeout + ABANDON_GRACE);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.services.store
    }

    /// Handle one delivery of the task for `job_id`.
    ///
    /// Returns `Err` only when the job cannot be read or written; stage
    /// failures are recorded on the job and reported as [`RenderOutcome::Failed`].
    pub async fn run(&self, job_id: &JobId) -> WorkerResult<RenderOutcome> {
        let logger = JobLogger::new(job_id, "render");
        let span = logger.create_span();
        self.run_job(job_id, &logger).instrument(span).await
    }

    async fn run_job(&self, job_id: &JobId, logger: &JobLogger) -> WorkerResult<RenderOutcome> {
        let store = &self.services.store;

        let job = store
            .get(job_id)
            .await?
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))?;

        if job.status == JobStatus::Rendering && self.is_abandoned(&job) {
            return self.close_abandoned(&job, logger).await;
        }
        if job.status != JobStatus::Queued {
            return Ok(self.skip(&job, logger));
        }

        let job = match store.update(job_id, &JobUpdate::start()).await {
            Ok(job) => job,
            // Another delivery started it between our read and write
            Err(WorkerError::Transition(_)) => return self.skip_current(job_id, logger).await,
            Err(e) => return Err(e),
        };
        let mut guard = CancelGuard::new(Arc::clone(store), job_id.clone());
        logger.log_start(&format!(
            "{} photos, style {}, {}s",
            job.payload.photos.len(),
            job.payload.style,
            job.payload.duration_sec
        ));

        let scratch = ScratchDir::create(&self.work_dir, job_id);
        let result = match &scratch {
            Ok(dir) => self.execute_bounded(&job, dir, logger).await,
            Err(e) => Err(WorkerError::Io(std::io::Error::new(
                e.kind(),
                format!("scratch directory: {}", e),
            ))),
        };

        let outcome = self.finalize(job_id, result, logger).await;
        guard.disarm();
        drop(scratch);
        outcome
    }

    /// Whether a `rendering` job has outlived any live owner.
    fn is_abandoned(&self, job: &Job) -> bool {
        let Some(limit) = self.abandon_after else {
            return false;
        };
        Utc::now()
            .signed_duration_since(job.updated_at)
            .to_std()
            .is_ok_and(|idle| idle > limit)
    }

    async fn close_abandoned(&self, job: &Job, logger: &JobLogger) -> WorkerResult<RenderOutcome> {
        let error = format!(
            "Render abandoned at {}% with no progress since {}",
            job.progress,
            job.updated_at.to_rfc3339()
        );
        logger.log_error(&error);
        match write_terminal(self.services.store.as_ref(), &job.id, &JobUpdate::failed(error.as_str())).await {
            Ok(_) => {
                record_render("abandoned");
                Ok(RenderOutcome::Failed { error })
            }
            Err(WorkerError::Transition(_)) => self.skip_current(&job.id, logger).await,
            Err(e) => Err(e),
        }
    }

    /// Re-read the job after losing a write race and report it as skipped.
    async fn skip_current(&self, job_id: &JobId, logger: &JobLogger) -> WorkerResult<RenderOutcome> {
        let current = self
            .services
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))?;
        Ok(self.skip(&current, logger))
    }

    fn skip(&self, job: &Job, logger: &JobLogger) -> RenderOutcome {
        logger.log_warning(&format!("job is already {}, ignoring redelivery", job.status));
        record_render("skipped");
        RenderOutcome::Skipped {
            status: job.status,
            output_url: job.output_url.clone(),
        }
    }

    async fn execute_bounded(&self, job: &Job, scratch: &ScratchDir, logger: &JobLogger) -> WorkerResult<String> {
        match self.job_timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute(job, scratch, logger))
                .await
                .unwrap_or(Err(WorkerError::Timeout(limit.as_secs()))),
            None => self.execute(job, scratch, logger).await,
        }
    }

    /// Run every stage and return the published URL.
    async fn execute(&self, job: &Job, scratch: &ScratchDir, logger: &JobLogger) -> WorkerResult<String> {
        let payload = &job.payload;

        // Script
        let started = Instant::now();
        let script = match self
            .services
            .script
            .generate(&payload.location, &payload.description)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                logger.log_warning("script generator returned no text, using fallback script");
                record_fallback("script");
                fallback_script(&payload.location)
            }
            Err(e) => {
                logger.log_warning(&format!("script generation failed, using fallback script: {}", e));
                record_fallback("script");
                fallback_script(&payload.location)
            }
        };
        record_stage("script", started.elapsed());
        self.checkpoint(&job.id, Checkpoint::ScriptReady, logger).await?;

        // Voice
        let started = Instant::now();
        let voice_audio = self
            .services
            .voice
            .synthesize(&script, payload.voice_id.as_deref())
            .await?;
        let voice_path = scratch.join("voice.wav");
        tokio::fs::write(&voice_path, &voice_audio).await?;
        record_stage("voice", started.elapsed());
        self.checkpoint(&job.id, Checkpoint::VoiceReady, logger).await?;

        // Accent clip
        let started = Instant::now();
        let accent = self.accent_clip(job, scratch, logger).await;
        record_stage("accent", started.elapsed());
        self.checkpoint(&job.id, Checkpoint::AccentDecided, logger).await?;

        // Build and encode
        let started = Instant::now();
        let photos = self.resolve_photos(&payload.photos, scratch).await?;
        let voice = path_string(&voice_path);
        let music = self.config.music_asset().map(|p| path_string(p));
        let accent = accent.as_deref().map(path_string);

        let graph = build_graph(&GraphSpec {
            photos: &photos,
            script: &script,
            style: payload.style,
            duration_sec: payload.duration_sec,
            voice: &voice,
            music: music.as_deref(),
            accent: accent.as_deref(),
        })?;

        let output = scratch.join("reel.mp4");
        self.services.encoder.encode(&graph, &output).await?;
        record_stage("encode", started.elapsed());
        self.checkpoint(&job.id, Checkpoint::Encoded, logger).await?;

        // Publish
        let started = Instant::now();
        let url = self.services.blob.upload(&job.id, &output).await?;
        record_stage("publish", started.elapsed());
        Ok(url)
    }

    /// Generate the accent clip when enabled and placeable. Never fails the job.
    async fn accent_clip(&self, job: &Job, scratch: &ScratchDir, logger: &JobLogger) -> Option<PathBuf> {
        if !self.config.accent_enabled {
            return None;
        }
        let generator = self.services.accent.as_ref()?;
        // Skip the billable call when the clip could not be inserted anyway
        accent_placement(job.payload.style, job.payload.photos.len(), true)?;

        match generator.generate(&job.payload.location, scratch.path()).await {
            Ok(path) => Some(path),
            Err(e) => {
                logger.log_warning(&format!("accent clip failed, continuing without it: {}", e));
                record_fallback("accent");
                None
            }
        }
    }

    /// Local paths or URLs the encoder can open, in render order.
    async fn resolve_photos(&self, photos: &[String], scratch: &ScratchDir) -> WorkerResult<Vec<String>> {
        let mut resolved = Vec::with_capacity(photos.len());
        for (i, reference) in photos.iter().enumerate() {
            if is_direct_reference(reference) {
                resolved.push(reference.clone());
                continue;
            }
            let dest = scratch.join(format!("photo_{:02}.{}", i, photo_extension(reference)));
            self.services.blob.fetch(reference, &dest).await?;
            resolved.push(path_string(&dest));
        }
        Ok(resolved)
    }

    async fn checkpoint(&self, job_id: &JobId, checkpoint: Checkpoint, logger: &JobLogger) -> WorkerResult<()> {
        self.services
            .store
            .update(job_id, &JobUpdate::checkpoint(checkpoint))
            .await?;
        logger.log_stage(checkpoint.as_str(), checkpoint.progress());
        Ok(())
    }

    /// Terminal write for a started job.
    async fn finalize(
        &self,
        job_id: &JobId,
        result: WorkerResult<String>,
        logger: &JobLogger,
    ) -> WorkerResult<RenderOutcome> {
        let store = self.services.store.as_ref();
        match result {
            Ok(output_url) => match write_terminal(store, job_id, &JobUpdate::done(output_url.as_str())).await {
                Ok(_) => {
                    logger.log_completion(&output_url);
                    record_render("completed");
                    Ok(RenderOutcome::Completed { output_url })
                }
                Err(WorkerError::Transition(_)) => self.skip_current(job_id, logger).await,
                Err(e) => Err(e),
            },
            Err(e) => {
                let error = e.to_string();
                logger.log_error(&error);
                match write_terminal(store, job_id, &JobUpdate::failed(error.as_str())).await {
                    Ok(_) => {
                        record_render("failed");
                        Ok(RenderOutcome::Failed { error })
                    }
                    Err(WorkerError::Transition(_)) => self.skip_current(job_id, logger).await,
                    Err(e) => Err(e),
                }
            }
        }
    }
}

/// Apply a terminal update, retrying transient store failures with backoff.
async fn write_terminal(store: &dyn JobStore, job_id: &JobId, update: &JobUpdate) -> WorkerResult<Job> {
    let mut attempt = 0;
    loop {
        match store.update(job_id, update).await {
            Err(e) if e.is_retryable() && attempt + 1 < TERMINAL_WRITE_ATTEMPTS => {
                let delay = TERMINAL_WRITE_BACKOFF * 2u32.pow(attempt);
                warn!(
                    job_id = %job_id,
                    status = %update.status,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Terminal write failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Records `error` on a started job whose run is dropped before its terminal write.
struct CancelGuard {
    store: Arc<dyn JobStore>,
    job_id: JobId,
    armed: bool,
}

impl CancelGuard {
    fn new(store: Arc<dyn JobStore>, job_id: JobId) -> Self {
        Self {
            store,
            job_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(job_id = %self.job_id, "Render dropped outside a runtime, job left rendering");
            return;
        };

        warn!(job_id = %self.job_id, "Render dropped before its terminal write, recording error");
        record_render("cancelled");
        let store = Arc::clone(&self.store);
        let job_id = self.job_id.clone();
        handle.spawn(async move {
            let update = JobUpdate::failed(CANCELLED_MESSAGE);
            match write_terminal(store.as_ref(), &job_id, &update).await {
                Ok(_) | Err(WorkerError::Transition(_)) => {}
                Err(e) => warn!(job_id = %job_id, "Failed to record cancelled render: {}", e),
            }
        });
    }
}

/// URLs and existing local files are handed to the encoder as-is.
fn is_direct_reference(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://") || Path::new(reference).is_file()
}

fn photo_extension(reference: &str) -> &str {
    Path::new(reference)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("jpg")
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
