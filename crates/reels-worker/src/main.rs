//! Render worker binary.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reels_media::check_ffmpeg;
use reels_queue::RenderQueue;
use reels_worker::{pipeline_from_env, JobExecutor, RenderConfig, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting reels-worker");

    let config = WorkerConfig::from_env();
    let render_config = RenderConfig::from_env();
    info!(?config, ?render_config, "Worker config");

    let ffmpeg = check_ffmpeg().context("ffmpeg is required")?;
    info!("Using ffmpeg at {}", ffmpeg.display());

    let pipeline = pipeline_from_env(render_config, &config)
        .await
        .context("render pipeline")?;

    let queue = RenderQueue::from_env().context("render queue")?;
    let executor = JobExecutor::new(config, queue, pipeline);

    let shutdown = executor.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown.send(true);
        }
    });

    executor.run().await.context("executor failed")?;

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reels=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}
