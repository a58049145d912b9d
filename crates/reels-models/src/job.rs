//! Render job record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{JobStatus, JobUpdate, RenderRequest, TransitionError};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One render from submission to terminal state.
///
/// `output_url` is set only when `status` is done, `error` only when it is error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,

    #[serde(default)]
    pub status: JobStatus,

    /// 0..=100, non-decreasing while rendering
    #[serde(default)]
    pub progress: u8,

    #[serde(default)]
    pub output_url: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    /// Immutable once the job is created
    pub payload: RenderRequest,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a queued job.
    pub fn new(id: JobId, payload: RenderRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            output_url: None,
            error: None,
            payload,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate an update against this job without applying it.
    pub fn check(&self, update: &JobUpdate) -> Result<(), TransitionError> {
        TransitionError::check(self.status, self.progress, update)
    }

    /// Apply an update in place, bumping `updated_at`.
    pub fn apply(&mut self, update: &JobUpdate) -> Result<(), TransitionError> {
        self.check(update)?;

        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if let Some(url) = &update.output_url {
            self.output_url = Some(url.clone());
        }
        if let Some(message) = &update.error {
            self.error = Some(message.clone());
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
