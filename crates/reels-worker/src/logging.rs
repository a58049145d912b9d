//! Structured job logging utilities.
//!
//! Every job gets the same start/progress/warning/error/completion lines with
//! the job id and operation attached as fields.

use tracing::{error, info, warn, Span};

use reels_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation (e.g. "render").
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, operation = %self.operation, "Job started: {}", message);
    }

    /// Log a stage milestone.
    pub fn log_stage(&self, stage: &str, progress: u8) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = stage,
            progress = progress,
            "Job progress: {} ({}%)", stage, progress
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, operation = %self.operation, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, operation = %self.operation, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, operation = %self.operation, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span to instrument the whole job with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = %self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_carries_ids() {
        let job_id = JobId::from_string("job-3");
        let logger = JobLogger::new(&job_id, "render");

        assert_eq!(logger.job_id(), "job-3");
        assert_eq!(logger.operation(), "render");
    }
}
