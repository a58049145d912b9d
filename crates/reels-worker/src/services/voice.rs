//! Voice synthesis providers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use reels_media::audio::placeholder_tone_wav;

use super::VoiceSynthesizer;
use crate::config::TtsProvider;
use crate::error::{WorkerError, WorkerResult};

/// Placeholder provider: a fixed 440 Hz tone regardless of the text.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockVoice;

#[async_trait]
impl VoiceSynthesizer for MockVoice {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> WorkerResult<Vec<u8>> {
        debug!(words = text.split_whitespace().count(), voice = ?voice_id, "Synthesizing placeholder voice");
        Ok(placeholder_tone_wav())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ElevenLabsVoice;

#[async_trait]
impl VoiceSynthesizer for ElevenLabsVoice {
    async fn synthesize(&self, _text: &str, _voice_id: Option<&str>) -> WorkerResult<Vec<u8>> {
        Err(WorkerError::voice_failed("ElevenLabs TTS not implemented yet"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PollyVoice;

#[async_trait]
impl VoiceSynthesizer for PollyVoice {
    async fn synthesize(&self, _text: &str, _voice_id: Option<&str>) -> WorkerResult<Vec<u8>> {
        Err(WorkerError::voice_failed("Polly TTS not implemented yet"))
    }
}

/// Provider for the configured selector.
pub fn voice_synthesizer(provider: TtsProvider) -> Arc<dyn VoiceSynthesizer> {
    match provider {
        TtsProvider::Mock => Arc::new(MockVoice),
        TtsProvider::ElevenLabs => Arc::new(ElevenLabsVoice),
        TtsProvider::Polly => Arc::new(PollyVoice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_voice_is_wav() {
        let bytes = voice_synthesizer(TtsProvider::Mock)
            .synthesize("Welcome home", Some("rachel"))
            .await
            .unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }

    #[tokio::test]
    async fn test_unimplemented_providers_fail_fast() {
        for provider in [TtsProvider::ElevenLabs, TtsProvider::Polly] {
            let err = voice_synthesizer(provider).synthesize("hi", None).await.unwrap_err();
            assert!(matches!(err, WorkerError::VoiceFailed(ref m) if m.contains("not implemented")));
        }
    }
}
