//! Shared data models for the VR Reels renderer.
//!
//! This crate provides Serde-serializable types for:
//! - Render jobs and their status/progress state machine
//! - Render requests (the immutable job payload)
//! - Style presets
//! - Task messages delivered to the render entry point
//! - Output encoding configuration

pub mod encoding;
pub mod job;
pub mod job_status;
pub mod request;
pub mod style;
pub mod task;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{Job, JobId};
pub use job_status::{Checkpoint, JobStatus, JobStatusParseError, JobUpdate, TransitionError};
pub use request::{RenderRequest, DEFAULT_DURATION_SEC};
pub use style::{StyleParseError, StylePreset};
pub use task::RenderTask;
