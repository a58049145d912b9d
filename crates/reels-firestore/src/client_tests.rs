//! Tests for Firestore client configuration, URLs and error mapping.

use std::time::Duration;

use serial_test::serial;

use crate::client::{update_url, FirestoreConfig};
use crate::error::FirestoreError;

// =============================================================================
// Configuration
// =============================================================================

#[test]
#[serial]
fn test_config_from_env_requires_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    assert!(FirestoreConfig::from_env().is_err());
}

#[test]
#[serial]
fn test_config_falls_back_to_firebase_project() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::set_var("FIREBASE_PROJECT_ID", "reels-dev");
    std::env::remove_var("FIRESTORE_DATABASE_ID");
    std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");

    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "reels-dev");
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(
        config.documents_url(),
        "https://firestore.googleapis.com/v1/projects/reels-dev/databases/(default)/documents"
    );

    std::env::remove_var("FIREBASE_PROJECT_ID");
}

// =============================================================================
// URLs
// =============================================================================

#[test]
fn test_update_url_with_mask_and_precondition() {
    let mask = vec!["status".to_string(), "progress".to_string()];
    let url = update_url("https://fs/documents/jobs/j1", Some(&mask), Some("2026-01-02T03:04:05.123456Z"));
    assert_eq!(
        url,
        "https://fs/documents/jobs/j1?updateMask.fieldPaths=status&updateMask.fieldPaths=progress\
         &currentDocument.updateTime=2026-01-02T03%3A04%3A05.123456Z"
    );
}

#[test]
fn test_update_url_without_params() {
    assert_eq!(update_url("https://fs/documents/jobs/j1", None, None), "https://fs/documents/jobs/j1");
}

// =============================================================================
// Error mapping
// =============================================================================

#[test]
fn test_error_from_http_status() {
    assert!(matches!(FirestoreError::from_http_status(429, "slow down"), FirestoreError::RateLimited(_)));
    assert!(matches!(FirestoreError::from_http_status(503, "x"), FirestoreError::ServerError(503, _)));
    assert!(matches!(FirestoreError::from_http_status(404, "x"), FirestoreError::NotFound(_)));
    assert!(matches!(FirestoreError::from_http_status(409, "x"), FirestoreError::AlreadyExists(_)));
    assert!(matches!(FirestoreError::from_http_status(412, "x"), FirestoreError::PreconditionFailed(_)));
    assert!(matches!(FirestoreError::from_http_status(400, "x"), FirestoreError::RequestFailed(_)));
}

#[test]
fn test_retryability() {
    assert!(FirestoreError::from_http_status(429, "x").is_retryable());
    assert!(FirestoreError::from_http_status(500, "x").is_retryable());
    assert!(!FirestoreError::from_http_status(400, "x").is_retryable());
    assert!(!FirestoreError::from_http_status(412, "x").is_retryable());
    assert!(FirestoreError::from_http_status(412, "x").is_precondition_failed());
    assert!(FirestoreError::request_failed("FAILED_PRECONDITION: stale").is_precondition_failed());
}

#[test]
fn test_http_status_roundtrip() {
    for status in [401u16, 403, 404, 409, 412, 429, 502] {
        assert_eq!(FirestoreError::from_http_status(status, "x").http_status(), Some(status));
    }
    assert_eq!(FirestoreError::RateLimited(2500).retry_after_ms(), Some(2500));
}
