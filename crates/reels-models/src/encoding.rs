//! Output encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Vertical 9:16 canvas
pub const OUTPUT_WIDTH: u32 = 1080;
pub const OUTPUT_HEIGHT: u32 = 1920;
pub const OUTPUT_FPS: u32 = 30;
/// 4:2:0 chroma for broad player support
pub const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";

/// Encoding parameters for the muxed reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    /// Move the moov atom to the front so playback can start before download ends
    pub faststart: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            fps: OUTPUT_FPS,
            width: OUTPUT_WIDTH,
            height: OUTPUT_HEIGHT,
            pixel_format: OUTPUT_PIXEL_FORMAT.to_string(),
            faststart: true,
        }
    }
}

impl EncodingConfig {
    /// Canvas size in FFmpeg `WxH` form.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ];

        if self.faststart {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend([
            "-r".to_string(),
            self.fps.to_string(),
            "-s".to_string(),
            self.size(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
        ]);

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_args() {
        let args = EncodingConfig::default().to_ffmpeg_args().join(" ");
        assert_eq!(
            args,
            "-c:v libx264 -preset fast -crf 23 -c:a aac -b:a 128k -movflags +faststart -r 30 -s 1080x1920 -pix_fmt yuv420p"
        );
    }

    #[test]
    fn test_faststart_can_be_disabled() {
        let config = EncodingConfig {
            faststart: false,
            ..Default::default()
        };
        assert!(!config.to_ffmpeg_args().contains(&"+faststart".to_string()));
    }
}
