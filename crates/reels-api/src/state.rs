//! Application state.

use std::sync::Arc;

use reels_queue::{RenderQueue, TaskDispatcher};
use reels_worker::services::JobStore;
use reels_worker::{pipeline_from_env, RenderConfig, RenderPipeline, WorkerConfig, WorkerResult};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    /// Job records; the same store the pipeline writes to
    pub jobs: Arc<dyn JobStore>,
    pub dispatcher: Arc<dyn TaskDispatcher>,
    pub pipeline: Arc<RenderPipeline>,
}

impl AppState {
    /// State around an already-wired pipeline; jobs are read from its store.
    pub fn new(config: ApiConfig, pipeline: RenderPipeline, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        Self {
            config,
            jobs: Arc::clone(pipeline.store()),
            dispatcher,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Create application state from the environment.
    pub async fn from_env(config: ApiConfig) -> WorkerResult<Self> {
        let pipeline = pipeline_from_env(RenderConfig::from_env(), &WorkerConfig::from_env()).await?;
        let queue = RenderQueue::from_env()?;
        queue.init().await?;

        Ok(Self::new(config, pipeline, Arc::new(queue)))
    }
}
