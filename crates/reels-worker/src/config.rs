//! Worker configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Voice synthesis provider selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    /// Fixed-tone placeholder track
    #[default]
    Mock,
    ElevenLabs,
    Polly,
}

impl TtsProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsProvider::Mock => "mock",
            TtsProvider::ElevenLabs => "elevenlabs",
            TtsProvider::Polly => "polly",
        }
    }
}

impl fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtsProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(TtsProvider::Mock),
            "elevenlabs" => Ok(TtsProvider::ElevenLabs),
            "polly" => Ok(TtsProvider::Polly),
            other => Err(format!("unknown TTS provider: {}", other)),
        }
    }
}

/// Render behaviour handed to the pipeline at construction.
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Attempt accent clips for hybrid jobs
    pub accent_enabled: bool,
    pub tts_provider: TtsProvider,
    /// Background music; silence is generated when unset
    pub music_path: Option<PathBuf>,
    /// Bucket finished reels are published to
    pub output_bucket: Option<String>,
}

impl RenderConfig {
    /// Create config from environment variables.
    ///
    /// An unknown `TTS_PROVIDER` falls back to the mock provider.
    pub fn from_env() -> Self {
        let accent_enabled = std::env::var("ACCENT_ENABLED")
            .or_else(|_| std::env::var("ENABLE_VEO"))
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let tts_provider = std::env::var("TTS_PROVIDER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            accent_enabled,
            tts_provider,
            music_path: std::env::var("MUSIC_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            output_bucket: std::env::var("R2_BUCKET_NAME").ok(),
        }
    }

    /// Music asset to mix, if configured and present on disk.
    pub fn music_asset(&self) -> Option<&PathBuf> {
        self.music_path.as_ref().filter(|p| p.is_file())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Queue worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Wall-clock limit for one job's stages
    pub job_timeout: Duration,
    /// Limit for the encoder process
    pub encode_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Root for per-job scratch directories
    pub work_dir: PathBuf,
    /// How often to scan for orphaned pending deliveries
    pub claim_interval: Duration,
    /// Idle time before a pending delivery can be claimed
    pub claim_min_idle: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(900),
            encode_timeout: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(60),
            work_dir: std::env::temp_dir().join("reels"),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(900),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            job_timeout: env_secs("WORKER_JOB_TIMEOUT").unwrap_or(defaults.job_timeout),
            encode_timeout: env_secs("WORKER_ENCODE_TIMEOUT").unwrap_or(defaults.encode_timeout),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT").unwrap_or(defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS").unwrap_or(defaults.claim_interval),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS").unwrap_or(defaults.claim_min_idle),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_render_env() {
        for var in ["ACCENT_ENABLED", "ENABLE_VEO", "TTS_PROVIDER", "MUSIC_PATH", "R2_BUCKET_NAME"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_render_config_defaults() {
        clear_render_env();
        let config = RenderConfig::from_env();
        assert!(!config.accent_enabled);
        assert_eq!(config.tts_provider, TtsProvider::Mock);
        assert!(config.music_path.is_none());
    }

    #[test]
    #[serial]
    fn test_render_config_legacy_accent_flag() {
        clear_render_env();
        std::env::set_var("ENABLE_VEO", "true");
        std::env::set_var("TTS_PROVIDER", "Polly");
        let config = RenderConfig::from_env();
        assert!(config.accent_enabled);
        assert_eq!(config.tts_provider, TtsProvider::Polly);
        clear_render_env();
    }

    #[test]
    #[serial]
    fn test_unknown_tts_provider_uses_mock() {
        clear_render_env();
        std::env::set_var("TTS_PROVIDER", "festival");
        assert_eq!(RenderConfig::from_env().tts_provider, TtsProvider::Mock);
        clear_render_env();
    }

    #[test]
    fn test_missing_music_file_is_ignored() {
        let config = RenderConfig {
            music_path: Some(PathBuf::from("/nonexistent/bed.mp3")),
            ..Default::default()
        };
        assert!(config.music_asset().is_none());
    }

    #[test]
    #[serial]
    fn test_worker_config_rejects_zero_concurrency() {
        std::env::set_var("WORKER_MAX_JOBS", "0");
        std::env::set_var("WORKER_JOB_TIMEOUT", "120");
        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.job_timeout, Duration::from_secs(120));
        std::env::remove_var("WORKER_MAX_JOBS");
        std::env::remove_var("WORKER_JOB_TIMEOUT");
    }

    #[test]
    fn test_tts_provider_parse() {
        assert_eq!("elevenlabs".parse::<TtsProvider>().unwrap(), TtsProvider::ElevenLabs);
        assert!("".parse::<TtsProvider>().is_err());
        assert_eq!(TtsProvider::Polly.to_string(), "polly");
    }
}
