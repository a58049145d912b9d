//! Render entry point: runs the pipeline for one task message.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use reels_models::{JobId, JobStatus};
use reels_worker::RenderOutcome;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Task message body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBody {
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub success: bool,
    pub job_id: String,
    pub output_url: Option<String>,
}

/// POST /render
///
/// Drives the job to a terminal state before responding. The render runs on
/// its own task, so it still finishes if the caller disconnects. Redeliveries
/// for a job that already left `queued` run nothing and report its current state.
///
/// Returns:
/// - 200: `{success, jobId, outputUrl}`
/// - 400: body has no `jobId`
/// - 404: job not found
/// - 500: the pipeline failed; the reason is on the job record
pub async fn render(State(state): State<AppState>, body: Option<Json<RenderBody>>) -> ApiResult<Json<RenderResponse>> {
    let job_id = body
        .and_then(|Json(b)| b.job_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing jobId"))?;
    let job_id = JobId::from_string(job_id);

    info!(job_id = %job_id, "Render task received");

    let pipeline = Arc::clone(&state.pipeline);
    let task_job_id = job_id.clone();
    let outcome = tokio::spawn(async move { pipeline.run(&task_job_id).await })
        .await
        .map_err(|e| ApiError::internal(format!("render task aborted: {}", e)))??;

    match outcome {
        RenderOutcome::Completed { output_url } => Ok(Json(RenderResponse {
            success: true,
            job_id: job_id.to_string(),
            output_url: Some(output_url),
        })),
        RenderOutcome::Failed { error } => {
            warn!(job_id = %job_id, "Render failed: {}", error);
            Err(ApiError::RenderFailed)
        }
        RenderOutcome::Skipped {
            status: JobStatus::Error,
            ..
        } => Err(ApiError::RenderFailed),
        RenderOutcome::Skipped { status, output_url } => Ok(Json(RenderResponse {
            success: status == JobStatus::Done,
            job_id: job_id.to_string(),
            output_url,
        })),
    }
}
