//! Render worker for property reels.
//!
//! This crate provides:
//! - The render pipeline (script, voice, accent clip, encode, publish)
//! - Collaborator traits with Gemini, Veo, FFmpeg, R2 and Firestore implementations
//! - Per-job scratch directories and structured job logging
//! - A Redis Streams executor for queued render tasks

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod scratch;
pub mod services;

pub use bootstrap::{pipeline_from_env, services_from_env};
pub use config::{RenderConfig, TtsProvider, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::{PipelineServices, RenderOutcome, RenderPipeline};
pub use scratch::ScratchDir;
