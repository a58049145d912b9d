//! Voiceover script generation with Gemini.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ScriptGenerator;
use crate::error::{WorkerError, WorkerResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Models tried in order after the configured one.
const FALLBACK_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.0-flash"];

/// Deterministic script used whenever generation fails.
pub fn fallback_script(location: &str) -> String {
    format!(
        "Welcome to {location}. This stunning property offers incredible features that will make your \
         stay unforgettable. The beautiful surroundings and amazing amenities create the perfect getaway \
         experience. You'll love the peaceful atmosphere and modern comforts. Save this for your next trip."
    )
}

/// Prompt for a property reel narration.
pub fn script_prompt(location: &str, description: &str) -> String {
    format!(
        r#"You write concise travel voiceovers for 25–32 second vertical reels.

Write a 95-word, second-person narration for a property reel.
Location: {location}
Description: """{description}"""

Requirements:
- Start with a 1-sentence hook.
- Include 3 standout features from the description.
- Include exactly one sensory detail.
- End with: "Save this for your next trip."
Style: upbeat, cinematic, clear. No emojis, no hashtags, no brand names."#
    )
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    models: Vec<String>,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> WorkerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            client,
        })
    }

    /// Create from `GEMINI_API_KEY`, preferring `GEMINI_MODEL` when set.
    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::config_error("GEMINI_API_KEY not set"))?;
        let mut client = Self::new(api_key)?;
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            client = client.with_preferred_model(model);
        }
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Try `model` before the built-in fallback list.
    pub fn with_preferred_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if model.trim().is_empty() {
            return self;
        }
        self.models.retain(|m| *m != model);
        self.models.insert(0, model);
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    async fn call_model(&self, model: &str, prompt: &str) -> WorkerResult<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::script_failed(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::script_failed(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::script_failed(format!("Failed to parse Gemini response: {}", e)))?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.trim())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(WorkerError::script_failed("No script generated"));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl ScriptGenerator for GeminiClient {
    async fn generate(&self, location: &str, description: &str) -> WorkerResult<String> {
        let prompt = script_prompt(location, description);
        let mut last_error = None;

        for model in &self.models {
            match self.call_model(model, &prompt).await {
                Ok(text) => {
                    info!(model = %model, words = text.split_whitespace().count(), "Generated script");
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WorkerError::script_failed("no Gemini models configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_response(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[test]
    fn test_fallback_script_names_location() {
        let script = fallback_script("Lake Como");
        assert!(script.starts_with("Welcome to Lake Como. This stunning property"));
        assert!(script.ends_with("Save this for your next trip."));
    }

    #[test]
    fn test_prompt_embeds_inputs() {
        let prompt = script_prompt("Tulum", "Jungle villa with plunge pool");
        assert!(prompt.contains("Location: Tulum"));
        assert!(prompt.contains(r#"Description: """Jungle villa with plunge pool""""#));
        assert!(prompt.contains("End with: \"Save this for your next trip.\""));
    }

    #[test]
    fn test_preferred_model_goes_first_once() {
        let client = GeminiClient::new("k").unwrap().with_preferred_model("gemini-2.0-flash");
        assert_eq!(client.models()[0], "gemini-2.0-flash");
        assert_eq!(client.models().iter().filter(|m| *m == "gemini-2.0-flash").count(), 1);
    }

    #[tokio::test]
    async fn test_generate_returns_trimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(text_response("  Picture waking up to the sea.  "))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key").unwrap().with_base_url(server.uri());
        let script = client.generate("Malibu", "Beach house").await.unwrap();
        assert_eq!(script, "Picture waking up to the sea.");
    }

    #[tokio::test]
    async fn test_generate_falls_through_models() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-lite:generateContent"))
            .respond_with(text_response("Second model wins."))
            .mount(&server)
            .await;

        let client = GeminiClient::new("k").unwrap().with_base_url(server.uri());
        assert_eq!(client.generate("Oslo", "Cabin").await.unwrap(), "Second model wins.");
    }

    #[tokio::test]
    async fn test_empty_text_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(text_response("   "))
            .mount(&server)
            .await;

        let client = GeminiClient::new("k").unwrap().with_base_url(server.uri());
        let err = client.generate("Oslo", "Cabin").await.unwrap_err();
        assert!(matches!(err, WorkerError::ScriptFailed(_)));
    }
}
