//! FFmpeg-backed encoder.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use reels_media::{encode_command, FfmpegRunner, MediaGraph};
use reels_models::EncodingConfig;

use super::Encoder;
use crate::error::WorkerResult;

/// Runs the graph through the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    encoding: EncodingConfig,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new(EncodingConfig::default())
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, graph: &MediaGraph, output: &Path) -> WorkerResult<()> {
        let cmd = encode_command(graph, &self.encoding, output);

        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout.as_secs());
        }

        let total_ms = i64::from(graph.duration_sec()) * 1000;
        runner
            .run_with_progress(&cmd, move |progress| {
                debug!(percent = progress.percentage(total_ms), speed = progress.speed, "Encoding");
            })
            .await?;

        info!(output = %output.display(), "Encoded reel");
        Ok(())
    }
}
