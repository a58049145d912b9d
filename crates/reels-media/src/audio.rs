//! Placeholder audio generation.

use std::f64::consts::PI;
use std::path::Path;

use crate::error::MediaResult;

pub const PLACEHOLDER_SAMPLE_RATE: u32 = 48_000;
pub const PLACEHOLDER_FREQUENCY_HZ: f64 = 440.0;
pub const PLACEHOLDER_DURATION_SEC: f64 = 2.0;

/// Half of full scale so the tone sits under the music bed.
const AMPLITUDE: f64 = 0.5;

/// Samples of a sine tone as signed 16-bit PCM.
pub fn sine_samples(frequency_hz: f64, duration_sec: f64, sample_rate: u32) -> Vec<i16> {
    let count = (duration_sec * f64::from(sample_rate)).round() as usize;
    (0..count)
        .map(|n| {
            let t = n as f64 / f64::from(sample_rate);
            ((2.0 * PI * frequency_hz * t).sin() * AMPLITUDE * f64::from(i16::MAX)) as i16
        })
        .collect()
}

/// Encode mono 16-bit PCM samples as a RIFF/WAVE byte buffer.
pub fn pcm16_mono_wav(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);

    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36u32 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    bytes
}

/// The fixed 2 s / 440 Hz placeholder voice track.
pub fn placeholder_tone_wav() -> Vec<u8> {
    let samples = sine_samples(PLACEHOLDER_FREQUENCY_HZ, PLACEHOLDER_DURATION_SEC, PLACEHOLDER_SAMPLE_RATE);
    pcm16_mono_wav(PLACEHOLDER_SAMPLE_RATE, &samples)
}

/// Write audio bytes to `path`.
pub async fn write_audio(path: &Path, bytes: &[u8]) -> MediaResult<()> {
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_header() {
        let wav = placeholder_tone_wav();
        let samples = 96_000usize;

        assert_eq!(wav.len(), 44 + samples * 2);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 48_000);
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);
        assert_eq!(
            u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize,
            samples * 2
        );
    }

    #[test]
    fn test_sine_starts_at_zero_and_peaks_at_half_scale() {
        let samples = sine_samples(440.0, 0.01, 48_000);
        assert_eq!(samples[0], 0);
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 16_000 && peak <= 16_384);
    }

    #[tokio::test]
    async fn test_write_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        write_audio(&path, &placeholder_tone_wav()).await.unwrap();
        assert!(tokio::fs::metadata(&path).await.unwrap().len() > 44);
    }
}
