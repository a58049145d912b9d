//! Media graph construction and FFmpeg CLI wrapper for reel rendering.
//!
//! This crate provides:
//! - Style policy for accent-clip placement
//! - Caption segmentation
//! - A typed filter graph built purely from the job inputs
//! - Serialization of that graph to `-filter_complex` plus the encode invocation
//! - Type-safe FFmpeg command building and a runner with progress parsing
//! - Placeholder audio generation

pub mod audio;
pub mod captions;
pub mod command;
pub mod error;
pub mod graph;
pub mod progress;
pub mod style_policy;

pub use captions::{caption_text, segment, CaptionChunk, WORDS_PER_CHUNK};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use graph::{
    build_graph, encode_command, per_photo_duration, to_filter_complex, GraphSpec, MediaGraph, NodeKind, StreamRef,
};
pub use progress::FfmpegProgress;
pub use style_policy::{accent_eligible, accent_placement, AccentPlacement, ACCENT_INSERT_INDEX};
