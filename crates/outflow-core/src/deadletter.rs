//! Dead-letter records: jobs that failed unrecoverably, kept for manual
//! inspection or replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored length of a dead-letter reason.
pub const DEAD_LETTER_REASON_MAX_LEN: usize = 2000;

/// A persisted record of a failed background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// Name of the job that failed.
    pub job_name: String,

    /// Runner-provided or generated job id.
    pub job_id: String,

    /// Arguments the job was invoked with.
    pub args: serde_json::Value,

    /// Failure reason, truncated to [`DEAD_LETTER_REASON_MAX_LEN`].
    pub reason: String,

    /// Retries attempted before the record was written.
    pub retries: u32,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    /// Create a record with a truncated reason.
    #[must_use]
    pub fn new(
        job_name: impl Into<String>,
        job_id: impl Into<String>,
        args: serde_json::Value,
        reason: &str,
    ) -> Self {
        let mut end = reason.len().min(DEAD_LETTER_REASON_MAX_LEN);
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            job_name: job_name.into(),
            job_id: job_id.into(),
            args,
            reason: reason[..end].to_string(),
            retries: 0,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_truncated() {
        let long = "e".repeat(DEAD_LETTER_REASON_MAX_LEN + 50);
        let rec = DeadLetterRecord::new("send_due", "job-1", serde_json::json!([]), &long);
        assert_eq!(rec.reason.len(), DEAD_LETTER_REASON_MAX_LEN);
        assert_eq!(rec.retries, 0);
    }

    #[test]
    fn short_reason_kept_verbatim() {
        let rec = DeadLetterRecord::new(
            "send_due",
            "job-2",
            serde_json::json!({"batch": 50}),
            "store unavailable",
        );
        assert_eq!(rec.reason, "store unavailable");
    }
}
