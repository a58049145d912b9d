//! Job creation and status handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

use reels_models::{Job, JobId, RenderRequest, RenderTask, StylePreset, DEFAULT_DURATION_SEC};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Owner used when the caller sends no `X-User-Id`.
pub const ANONYMOUS_USER: &str = "anonymous";

const MISSING_FIELDS: &str = "Missing required fields: location, description, photos";

// ============================================================================
// Types
// ============================================================================

/// Job creation body. Everything is optional here so that missing fields get
/// the API's own 400 messages instead of a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub duration_sec: Option<u32>,
    #[serde(default, alias = "voiceId")]
    pub voice: Option<String>,
    #[serde(default)]
    pub music_id: Option<String>,
    #[serde(default)]
    pub email_notify: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: String,
}

impl CreateJobBody {
    /// Validate and convert into the immutable job payload.
    pub fn into_request(self) -> ApiResult<RenderRequest> {
        let location = non_blank(self.location);
        let description = non_blank(self.description);
        let photos: Vec<String> = self
            .photos
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let (Some(location), Some(description)) = (location, description) else {
            return Err(ApiError::bad_request(MISSING_FIELDS));
        };
        if photos.is_empty() {
            return Err(ApiError::bad_request(MISSING_FIELDS));
        }

        let style: StylePreset = self
            .style
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|_| ApiError::bad_request(invalid_style_message()))?;

        let request = RenderRequest {
            title: non_blank(self.title),
            location,
            description,
            photos,
            style,
            duration_sec: self.duration_sec.unwrap_or(DEFAULT_DURATION_SEC),
            voice_id: non_blank(self.voice),
            music_id: non_blank(self.music_id),
            email_notify: self.email_notify.unwrap_or(false),
        };

        request
            .validate()
            .map_err(|e| ApiError::bad_request(format!("Invalid request: {}", e)))?;
        Ok(request)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn invalid_style_message() -> String {
    let names: Vec<&str> = StylePreset::ALL.iter().map(StylePreset::as_str).collect();
    format!("Invalid style. Must be one of: {}", names.join(", "))
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /jobs
///
/// Creates a `queued` job owned by `X-User-Id` and dispatches its render task.
///
/// Returns:
/// - 200: `{jobId}`
/// - 400: missing fields or unknown style
/// - 500: the job could not be stored or dispatched
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CreateJobBody>>,
) -> ApiResult<Json<CreateJobResponse>> {
    let request = body.map(|Json(b)| b).unwrap_or_default().into_request()?;
    let owner = user_id(&headers);
    let style = request.style;

    let job = Job::new(JobId::new(), request).with_user(owner.as_str());
    state.jobs.create(&job).await?;
    metrics::record_job_created(style.as_str());

    let task = RenderTask::new(job.id.clone());
    if let Err(e) = state.dispatcher.dispatch(&task).await {
        error!(job_id = %job.id, "Failed to dispatch render task: {}", e);
        metrics::record_job_dispatched("failed");
        return Err(e.into());
    }
    metrics::record_job_dispatched("ok");

    info!(job_id = %job.id, user_id = %owner, style = %style, "Job created");

    Ok(Json(CreateJobResponse {
        job_id: job.id.to_string(),
    }))
}

/// GET /jobs/:job_id
///
/// Returns the persisted job view, or 404.
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<Job>> {
    let job_id = JobId::from_string(job_id);
    state
        .jobs
        .get(&job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}
