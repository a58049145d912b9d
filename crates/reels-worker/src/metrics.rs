//! Render pipeline metrics.

use std::time::Duration;

use metrics::{counter, histogram};

pub mod names {
    pub const RENDERS_TOTAL: &str = "reels_renders_total";
    pub const STAGE_DURATION_SECONDS: &str = "reels_stage_duration_seconds";
    pub const FALLBACKS_TOTAL: &str = "reels_stage_fallbacks_total";
}

/// Terminal outcome of one delivery: `completed`, `failed` or `skipped`.
pub fn record_render(outcome: &'static str) {
    counter!(names::RENDERS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_stage(stage: &'static str, elapsed: Duration) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(elapsed.as_secs_f64());
}

/// A recoverable stage fell back (`script`) or was omitted (`accent`).
pub fn record_fallback(stage: &'static str) {
    counter!(names::FALLBACKS_TOTAL, "stage" => stage).increment(1);
}
