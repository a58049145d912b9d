//! Production wiring of the pipeline collaborators.
//!
//! Shared by the queue worker and the API's synchronous render endpoint so both
//! drive the same pipeline.

use std::sync::Arc;

use tracing::{info, warn};

use reels_firestore::{FirestoreClient, JobRepository};
use reels_models::EncodingConfig;
use reels_storage::R2Client;

use crate::config::{RenderConfig, WorkerConfig};
use crate::error::WorkerResult;
use crate::pipeline::{PipelineServices, RenderPipeline};
use crate::services::{voice_synthesizer, AccentGenerator, FfmpegEncoder, GeminiClient, VeoClient};

/// Firestore, R2, Gemini, Veo and FFmpeg collaborators from the environment.
///
/// A missing Veo configuration disables accent clips instead of failing. The
/// R2 bucket is checked once; an unreachable bucket is logged, not fatal.
pub async fn services_from_env(render_config: &RenderConfig, config: &WorkerConfig) -> WorkerResult<PipelineServices> {
    let store = JobRepository::new(FirestoreClient::from_env().await?);
    let blob = R2Client::from_env().await?;
    match blob.check_connectivity().await {
        Ok(()) => info!("R2 bucket reachable"),
        Err(e) => warn!("R2 connectivity check failed, publishing may fail: {}", e),
    }
    let script = GeminiClient::from_env()?;

    let accent: Option<Arc<dyn AccentGenerator>> = if render_config.accent_enabled {
        match VeoClient::from_env() {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Accent clips disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    Ok(PipelineServices {
        store: Arc::new(store),
        script: Arc::new(script),
        voice: voice_synthesizer(render_config.tts_provider),
        accent,
        encoder: Arc::new(FfmpegEncoder::new(EncodingConfig::default()).with_timeout(config.encode_timeout)),
        blob: Arc::new(blob),
    })
}

/// Pipeline configured from the environment.
pub async fn pipeline_from_env(render_config: RenderConfig, config: &WorkerConfig) -> WorkerResult<RenderPipeline> {
    let services = services_from_env(&render_config, config).await?;
    Ok(RenderPipeline::new(render_config, services, config.work_dir.clone()).with_job_timeout(config.job_timeout))
}
