//! Collaborators the render pipeline drives.
//!
//! Each external service sits behind a narrow trait so the pipeline can run
//! against real clients in production and in-memory fakes in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use reels_media::MediaGraph;
use reels_models::{Job, JobId, JobUpdate};

use crate::error::WorkerResult;

pub mod accent;
pub mod blob;
pub mod encoder;
pub mod script;
pub mod store;
pub mod voice;

pub use accent::{veo_prompt, VeoClient, VeoConfig};
pub use encoder::FfmpegEncoder;
pub use script::{fallback_script, script_prompt, GeminiClient};
pub use store::MemoryJobStore;
pub use voice::{voice_synthesizer, ElevenLabsVoice, MockVoice, PollyVoice};

/// Voiceover script generation. May fail; the caller falls back.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, location: &str, description: &str) -> WorkerResult<String>;
}

/// Speech synthesis to WAV bytes.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> WorkerResult<Vec<u8>>;
}

/// Best-effort accent clip generation into `dest_dir`.
#[async_trait]
pub trait AccentGenerator: Send + Sync {
    async fn generate(&self, location: &str, dest_dir: &Path) -> WorkerResult<PathBuf>;
}

/// Executes a media graph into an encoded file.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, graph: &MediaGraph, output: &Path) -> WorkerResult<()>;
}

/// Object storage for photo inputs and published reels.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Publish the finished reel and return its public URL.
    async fn upload(&self, job_id: &JobId, local_path: &Path) -> WorkerResult<String>;

    /// Download a stored photo reference to `dest`.
    async fn fetch(&self, reference: &str, dest: &Path) -> WorkerResult<()>;
}

/// Durable job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, job_id: &JobId) -> WorkerResult<Option<Job>>;

    async fn create(&self, job: &Job) -> WorkerResult<()>;

    /// Apply one validated update atomically and return the stored job.
    async fn update(&self, job_id: &JobId, update: &JobUpdate) -> WorkerResult<Job>;
}
