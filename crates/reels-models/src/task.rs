//! Task message delivered to the render entry point.

use serde::{Deserialize, Serialize};

use crate::JobId;

/// At-least-once task message: render the job with this id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTask {
    pub job_id: JobId,
}

impl RenderTask {
    pub fn new(job_id: JobId) -> Self {
        Self { job_id }
    }

    /// Key used to collapse duplicate dispatches of the same job.
    pub fn idempotency_key(&self) -> String {
        format!("render:{}", self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_uses_job_id_camel_case() {
        let task = RenderTask::new(JobId::from_string("job-42"));
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, r#"{"jobId":"job-42"}"#);
        assert_eq!(task.idempotency_key(), "render:job-42");
    }
}
