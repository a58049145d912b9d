//! Firestore metrics.

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Firestore requests by operation and HTTP status.
    pub const REQUESTS_TOTAL: &str = "reels_firestore_requests_total";

    /// Retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "reels_firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "reels_firestore_latency_seconds";

    /// Job record writes by resulting status.
    pub const JOB_WRITES_TOTAL: &str = "reels_job_writes_total";

    /// Checked writes that lost an `updateTime` race and re-read.
    pub const WRITE_CONFLICTS_TOTAL: &str = "reels_job_write_conflicts_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Record a job write that landed.
pub fn record_job_write(status: &str) {
    counter!(names::JOB_WRITES_TOTAL, "status" => status.to_string()).increment(1);
}

/// Record an `updateTime` precondition conflict.
pub fn record_write_conflict() {
    counter!(names::WRITE_CONFLICTS_TOTAL).increment(1);
}
