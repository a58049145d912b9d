//! Cloudflare R2 storage client.
//!
//! This crate provides:
//! - Publishing rendered reels under `users/{jobId}/reel.mp4`
//! - Public URL construction for published objects
//! - Fetching uploaded photo objects to local files

pub mod client;
pub mod error;
pub mod keys;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{object_key, output_key, OUTPUT_CACHE_CONTROL, OUTPUT_CONTENT_TYPE};
