//! Render request (the immutable job payload).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::StylePreset;

/// Target video length when the caller does not supply one.
pub const DEFAULT_DURATION_SEC: u32 = 30;

fn default_duration_sec() -> u32 {
    DEFAULT_DURATION_SEC
}

/// What to render: photos in render order plus the text used for the voiceover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Optional display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Property location, used in the script and accent prompt
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,

    /// Free-form property description
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,

    /// Image references, order is render order
    #[validate(length(min = 1, message = "at least one photo is required"))]
    pub photos: Vec<String>,

    /// Style preset
    #[serde(default)]
    pub style: StylePreset,

    /// Target duration in whole seconds
    #[serde(default = "default_duration_sec")]
    #[validate(range(min = 1, message = "durationSec must be positive"))]
    pub duration_sec: u32,

    /// Voice selection passed to the synthesizer
    #[serde(default, rename = "voice", alias = "voiceId", skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// Background music selection (reserved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_id: Option<String>,

    /// Notify the owner by email when the render completes
    #[serde(default)]
    pub email_notify: bool,
}

impl RenderRequest {
    /// Create a request with the required fields and defaults for the rest.
    pub fn new(
        location: impl Into<String>,
        description: impl Into<String>,
        photos: Vec<String>,
        style: StylePreset,
    ) -> Self {
        Self {
            title: None,
            location: location.into(),
            description: description.into(),
            photos,
            style,
            duration_sec: DEFAULT_DURATION_SEC,
            voice_id: None,
            music_id: None,
            email_notify: false,
        }
    }

    /// Set the target duration.
    pub fn with_duration(mut self, duration_sec: u32) -> Self {
        self.duration_sec = duration_sec;
        self
    }

    /// Set the voice.
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_applies_defaults() {
        let json = r#"{
            "location": "Tulum",
            "description": "Jungle villa with plunge pool",
            "photos": ["a.jpg", "b.jpg"],
            "style": "hybrid"
        }"#;
        let req: RenderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.duration_sec, 30);
        assert_eq!(req.style, StylePreset::Hybrid);
        assert!(req.voice_id.is_none());
        assert!(!req.email_notify);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_voice_field_accepts_both_names() {
        let a: RenderRequest = serde_json::from_str(
            r#"{"location":"x","description":"y","photos":["p"],"style":"classic","voice":"rachel"}"#,
        )
        .unwrap();
        let b: RenderRequest = serde_json::from_str(
            r#"{"location":"x","description":"y","photos":["p"],"style":"classic","voiceId":"rachel"}"#,
        )
        .unwrap();
        assert_eq!(a.voice_id.as_deref(), Some("rachel"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_validation_rejects_empty_photos_and_zero_duration() {
        let req = RenderRequest::new("Aspen", "Ski cabin", vec![], StylePreset::Classic);
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("photos"));

        let req = RenderRequest::new("Aspen", "Ski cabin", vec!["p.jpg".into()], StylePreset::Classic)
            .with_duration(0);
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("duration_sec"));
    }
}
