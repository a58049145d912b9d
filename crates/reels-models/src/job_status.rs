//! Job status and the legal transitions between statuses.
//!
//! A job moves `queued -> rendering -> {done | error}`. While rendering it
//! carries a progress value that only advances through fixed [`Checkpoint`]s.
//! `done` and `error` are terminal and reject every further update.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Render job status as persisted in the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for the dispatcher
    #[default]
    Queued,
    /// Picked up by a worker, progress advancing
    Rendering,
    /// Output uploaded, `outputUrl` set
    Done,
    /// Fatal failure, `error` set
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Rendering => "rendering",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Whether a write may move a job from `self` to `next`.
    ///
    /// `rendering -> rendering` is the checkpoint write.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Rendering)
                | (JobStatus::Rendering, JobStatus::Rendering)
                | (JobStatus::Rendering, JobStatus::Done)
                | (JobStatus::Rendering, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "rendering" => Ok(JobStatus::Rendering),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            _ => Err(JobStatusParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown job status: {0}")]
pub struct JobStatusParseError(String);

// ============================================================================
// Checkpoints
// ============================================================================

/// Fixed progress milestones written while a job renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Checkpoint {
    /// Job accepted by a worker
    Accepted,
    /// Script generated (or fallback used)
    ScriptReady,
    /// Voiceover synthesized
    VoiceReady,
    /// Accent clip attempted; written whether or not it succeeded
    AccentDecided,
    /// Final video encoded
    Encoded,
    /// Output uploaded
    Published,
}

impl Checkpoint {
    pub const ALL: &'static [Checkpoint] = &[
        Checkpoint::Accepted,
        Checkpoint::ScriptReady,
        Checkpoint::VoiceReady,
        Checkpoint::AccentDecided,
        Checkpoint::Encoded,
        Checkpoint::Published,
    ];

    pub fn progress(&self) -> u8 {
        match self {
            Checkpoint::Accepted => 5,
            Checkpoint::ScriptReady => 15,
            Checkpoint::VoiceReady => 25,
            Checkpoint::AccentDecided => 40,
            Checkpoint::Encoded => 80,
            Checkpoint::Published => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::Accepted => "accepted",
            Checkpoint::ScriptReady => "script_ready",
            Checkpoint::VoiceReady => "voice_ready",
            Checkpoint::AccentDecided => "accent_decided",
            Checkpoint::Encoded => "encoded",
            Checkpoint::Published => "published",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}%)", self.as_str(), self.progress())
    }
}

// ============================================================================
// Updates
// ============================================================================

/// A single atomic write to a job record.
///
/// `None` fields are left untouched by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub output_url: Option<String>,
    pub error: Option<String>,
}

impl JobUpdate {
    /// `queued -> rendering` at the accepted checkpoint.
    pub fn start() -> Self {
        Self::checkpoint(Checkpoint::Accepted)
    }

    /// Whether this is the write that claims a queued job.
    pub fn is_start(&self) -> bool {
        self.status == JobStatus::Rendering && self.progress == Some(Checkpoint::Accepted.progress())
    }

    /// Progress write while rendering.
    pub fn checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            status: JobStatus::Rendering,
            progress: Some(checkpoint.progress()),
            output_url: None,
            error: None,
        }
    }

    /// Terminal success with the published URL.
    pub fn done(output_url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Done,
            progress: Some(Checkpoint::Published.progress()),
            output_url: Some(output_url.into()),
            error: None,
        }
    }

    /// Terminal failure with a human-readable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            progress: None,
            output_url: None,
            error: Some(message.into()),
        }
    }
}

/// Why a [`JobUpdate`] was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job is already {0} and cannot change")]
    Terminal(JobStatus),

    #[error("illegal transition {from} -> {to}")]
    Illegal { from: JobStatus, to: JobStatus },

    #[error("job was already started")]
    AlreadyStarted,

    #[error("progress cannot go from {from} back to {to}")]
    ProgressRegression { from: u8, to: u8 },

    #[error("progress {0} is outside 0..=100")]
    OutOfRange(u8),

    #[error("done requires an output URL")]
    MissingOutputUrl,

    #[error("error requires a message")]
    MissingErrorMessage,
}

impl TransitionError {
    /// Checks an update against the current status and progress.
    pub fn check(current: JobStatus, progress: u8, update: &JobUpdate) -> Result<(), Self> {
        if current.is_terminal() {
            return Err(TransitionError::Terminal(current));
        }
        if !current.can_transition_to(update.status) {
            return Err(TransitionError::Illegal {
                from: current,
                to: update.status,
            });
        }
        // Only one delivery may claim a job; later checkpoints need a claimed job
        match (current, update.is_start()) {
            (JobStatus::Rendering, true) => return Err(TransitionError::AlreadyStarted),
            (JobStatus::Queued, false) => {
                return Err(TransitionError::Illegal {
                    from: current,
                    to: update.status,
                })
            }
            _ => {}
        }
        if let Some(next) = update.progress {
            if next > 100 {
                return Err(TransitionError::OutOfRange(next));
            }
            if current == JobStatus::Rendering && next < progress {
                return Err(TransitionError::ProgressRegression {
                    from: progress,
                    to: next,
                });
            }
        }
        match update.status {
            JobStatus::Done if update.output_url.as_deref().map_or(true, str::is_empty) => {
                Err(TransitionError::MissingOutputUrl)
            }
            JobStatus::Error if update.error.as_deref().map_or(true, |m| m.trim().is_empty()) => {
                Err(TransitionError::MissingErrorMessage)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [JobStatus::Queued, JobStatus::Rendering, JobStatus::Done, JobStatus::Error] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{}\"", status));
        }
        assert!("processing".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_checkpoints_strictly_increase() {
        let values: Vec<u8> = Checkpoint::ALL.iter().map(Checkpoint::progress).collect();
        assert_eq!(values, vec![5, 15, 25, 40, 80, 100]);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [JobStatus::Done, JobStatus::Error] {
            let err = TransitionError::check(terminal, 100, &JobUpdate::start()).unwrap_err();
            assert_eq!(err, TransitionError::Terminal(terminal));
            assert!(TransitionError::check(terminal, 100, &JobUpdate::failed("late")).is_err());
        }
    }

    #[test]
    fn test_queued_can_only_start() {
        assert!(TransitionError::check(JobStatus::Queued, 0, &JobUpdate::start()).is_ok());
        assert!(matches!(
            TransitionError::check(JobStatus::Queued, 0, &JobUpdate::done("https://x/y.mp4")),
            Err(TransitionError::Illegal { .. })
        ));
    }

    #[test]
    fn test_start_claims_only_once() {
        assert_eq!(
            TransitionError::check(JobStatus::Rendering, 5, &JobUpdate::start()),
            Err(TransitionError::AlreadyStarted)
        );
        assert_eq!(
            TransitionError::check(JobStatus::Rendering, 40, &JobUpdate::start()),
            Err(TransitionError::AlreadyStarted)
        );
        assert!(matches!(
            TransitionError::check(JobStatus::Queued, 0, &JobUpdate::checkpoint(Checkpoint::ScriptReady)),
            Err(TransitionError::Illegal { .. })
        ));
    }

    #[test]
    fn test_progress_never_regresses() {
        let update = JobUpdate::checkpoint(Checkpoint::ScriptReady);
        let err = TransitionError::check(JobStatus::Rendering, 40, &update).unwrap_err();
        assert_eq!(err, TransitionError::ProgressRegression { from: 40, to: 15 });

        let same = JobUpdate::checkpoint(Checkpoint::AccentDecided);
        assert!(TransitionError::check(JobStatus::Rendering, 40, &same).is_ok());
    }

    #[test]
    fn test_terminal_payload_required() {
        let mut done = JobUpdate::done("");
        assert_eq!(
            TransitionError::check(JobStatus::Rendering, 80, &done),
            Err(TransitionError::MissingOutputUrl)
        );
        done.output_url = Some("https://cdn/reel.mp4".into());
        assert!(TransitionError::check(JobStatus::Rendering, 80, &done).is_ok());

        assert_eq!(
            TransitionError::check(JobStatus::Rendering, 25, &JobUpdate::failed("  ")),
            Err(TransitionError::MissingErrorMessage)
        );
    }

    #[test]
    fn test_failed_keeps_progress() {
        let update = JobUpdate::failed("encode failed");
        assert!(update.progress.is_none());
        assert!(TransitionError::check(JobStatus::Rendering, 80, &update).is_ok());
    }
}
