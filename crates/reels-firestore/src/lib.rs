//! Firestore REST API client.
//!
//! This crate provides:
//! - The render job repository (get / create / checked update)
//! - Service account authentication via gcp_auth with a cached token
//! - Merge updates with `updateTime` preconditions and retry logic

pub mod client;
pub mod error;
pub mod jobs_repo;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use jobs_repo::{JobRepository, JOBS_COLLECTION};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
