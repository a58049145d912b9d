//! Accent clip generation with Veo on Vertex AI.
//!
//! Veo runs as a long-running operation: `predictLongRunning` starts it and
//! `fetchPredictOperation` is polled until the video bytes are returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use reels_firestore::token_cache::{TokenCache, CLOUD_PLATFORM_SCOPE};

use super::AccentGenerator;
use crate::error::{WorkerError, WorkerResult};

const DEFAULT_LOCATION: &str = "us-central1";
const DEFAULT_MODEL: &str = "veo-3.0-fast-generate-001";
const CLIP_DURATION_SEC: u32 = 8;

/// Prompt for a short motion accent near the property.
pub fn veo_prompt(location: &str) -> String {
    format!(
        "A subtle motion accent to intercut with vacation rental photos.\n\
         Scene: nature or amenity adjacent to {location}. Gentle movement, aesthetic bokeh.\n\
         Examples: palm fronds swaying, fireplace flicker, ocean shimmer, tree leaves in breeze.\n\
         Cinematic, soft light, crisp detail. Vertical 9:16. Duration 6–8 seconds."
    )
}

/// Vertex AI settings for Veo.
#[derive(Debug, Clone)]
pub struct VeoConfig {
    pub project_id: String,
    pub location: String,
    pub model: String,
    /// Delay between operation polls
    pub poll_interval: Duration,
    /// Polls before giving up
    pub max_polls: u32,
}

impl VeoConfig {
    pub fn from_env() -> WorkerResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| WorkerError::config_error("GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set for Veo"))?;

        Ok(Self {
            project_id,
            location: std::env::var("VERTEX_LOCATION").unwrap_or_else(|_| DEFAULT_LOCATION.to_string()),
            model: std::env::var("VERTEX_VEO_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            poll_interval: Duration::from_secs(10),
            max_polls: 30,
        })
    }

    /// Publisher model resource URL.
    pub fn model_url(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}",
            loc = self.location,
            project = self.project_id,
            model = self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct StartedOperation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

/// Veo client authenticated with the service account.
pub struct VeoClient {
    config: VeoConfig,
    http: Client,
    token_cache: Arc<TokenCache>,
}

impl VeoClient {
    pub fn new(config: VeoConfig, token_cache: Arc<TokenCache>) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http,
            token_cache,
        })
    }

    pub fn from_env() -> WorkerResult<Self> {
        let config = VeoConfig::from_env()?;
        let token_cache = TokenCache::from_service_account_env(CLOUD_PLATFORM_SCOPE)
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        Self::new(config, Arc::new(token_cache))
    }

    async fn post(&self, url: &str, body: &Value) -> WorkerResult<Value> {
        let token = self
            .token_cache
            .get_token()
            .await
            .map_err(|e| WorkerError::accent_failed(format!("auth: {}", e)))?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| WorkerError::accent_failed(format!("Vertex request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WorkerError::accent_failed(format!("Vertex returned {}: {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| WorkerError::accent_failed(format!("Failed to parse Vertex response: {}", e)))
    }
}

#[async_trait]
impl AccentGenerator for VeoClient {
    async fn generate(&self, location: &str, dest_dir: &Path) -> WorkerResult<PathBuf> {
        let model_url = self.config.model_url();

        let started: StartedOperation = serde_json::from_value(
            self.post(&format!("{}:predictLongRunning", model_url), &predict_request(location))
                .await?,
        )
        .map_err(|e| WorkerError::accent_failed(format!("Unexpected operation: {}", e)))?;
        info!(operation = %started.name, "Started Veo generation");

        for poll in 1..=self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            let value = self
                .post(
                    &format!("{}:fetchPredictOperation", model_url),
                    &json!({ "operationName": started.name }),
                )
                .await?;

            if let Some(bytes) = decode_operation(value)? {
                let path = dest_dir.join("accent.mp4");
                tokio::fs::write(&path, bytes).await?;
                info!(path = %path.display(), "Accent clip ready");
                return Ok(path);
            }
            debug!(poll = poll, "Veo operation still running");
        }

        Err(WorkerError::accent_failed(format!(
            "Veo operation {} did not finish after {} polls",
            started.name, self.config.max_polls
        )))
    }
}

fn predict_request(location: &str) -> Value {
    json!({
        "instances": [{ "prompt": veo_prompt(location) }],
        "parameters": {
            "aspectRatio": "9:16",
            "durationSeconds": CLIP_DURATION_SEC,
            "sampleCount": 1,
            "generateAudio": false
        }
    })
}

/// Video bytes of a finished operation, `None` while it is still running.
fn decode_operation(value: Value) -> WorkerResult<Option<Vec<u8>>> {
    let op: Operation = serde_json::from_value(value)
        .map_err(|e| WorkerError::accent_failed(format!("Unexpected operation: {}", e)))?;

    if !op.done {
        return Ok(None);
    }
    if let Some(err) = op.error {
        return Err(WorkerError::accent_failed(err.message));
    }

    let encoded = op
        .response
        .as_ref()
        .and_then(|r| r.get("videos"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("bytesBase64Encoded"))
        .and_then(Value::as_str)
        .ok_or_else(|| WorkerError::accent_failed("Veo returned no video"))?;

    STANDARD
        .decode(encoded)
        .map(Some)
        .map_err(|e| WorkerError::accent_failed(format!("Invalid video payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_location_and_format() {
        let prompt = veo_prompt("Kauai");
        assert!(prompt.contains("adjacent to Kauai."));
        assert!(prompt.contains("Vertical 9:16."));
    }

    #[test]
    fn test_predict_request_shape() {
        let body = predict_request("Kauai");
        assert_eq!(body["parameters"]["aspectRatio"], "9:16");
        assert_eq!(body["parameters"]["durationSeconds"], 8);
        assert!(body["instances"][0]["prompt"].as_str().unwrap().contains("Kauai"));
    }

    #[test]
    fn test_model_url() {
        let config = VeoConfig {
            project_id: "reels-prod".into(),
            location: "us-central1".into(),
            model: "veo-3.0-generate-001".into(),
            poll_interval: Duration::from_secs(1),
            max_polls: 1,
        };
        assert_eq!(
            config.model_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/reels-prod/locations/us-central1/publishers/google/models/veo-3.0-generate-001"
        );
    }

    #[test]
    fn test_decode_running_operation() {
        assert!(decode_operation(json!({ "name": "op/1" })).unwrap().is_none());
    }

    #[test]
    fn test_decode_finished_operation() {
        let value = json!({
            "done": true,
            "response": { "videos": [{ "bytesBase64Encoded": STANDARD.encode(b"mp4data"), "mimeType": "video/mp4" }] }
        });
        assert_eq!(decode_operation(value).unwrap().unwrap(), b"mp4data");
    }

    #[test]
    fn test_decode_failed_operation() {
        let value = json!({ "done": true, "error": { "code": 3, "message": "prompt rejected" } });
        assert!(matches!(decode_operation(value), Err(WorkerError::AccentFailed(m)) if m == "prompt rejected"));

        let empty = json!({ "done": true, "response": { "videos": [] } });
        assert!(decode_operation(empty).is_err());
    }
}
