//! Dead-letter capture for background jobs.
//!
//! Jobs that exhaust their attempts are written to a persistent
//! dead-letter queue instead of vanishing into the log stream. Capture is
//! best effort: a failure to persist the record is logged and swallowed so
//! the job runner itself never dies to bookkeeping.

use std::future::Future;
use std::sync::Arc;

use outflow_core::DeadLetterRecord;
use outflow_store::Store;

use crate::error::EngineError;

/// Wraps job executions and records terminal failures.
pub struct DeadLetterRecorder {
    store: Arc<dyn Store>,
}

impl DeadLetterRecorder {
    /// Create a recorder.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Run `job` once; on failure, persist a dead letter and return the
    /// original error.
    ///
    /// # Errors
    ///
    /// Propagates the job's own error unchanged.
    pub async fn run<F, T>(
        &self,
        job_name: &str,
        args: serde_json::Value,
        job: F,
    ) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        match job.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.capture(job_name, args, &e.to_string());
                Err(e)
            }
        }
    }

    /// Persist a dead letter directly.
    pub fn capture(&self, job_name: &str, args: serde_json::Value, reason: &str) {
        let job_id = uuid::Uuid::new_v4().to_string();
        let record = DeadLetterRecord::new(job_name, job_id.clone(), args, reason);
        tracing::error!(
            job_name = %job_name,
            job_id = %job_id,
            reason = %record.reason,
            "Job failed; writing dead letter"
        );
        if let Err(store_err) = self.store.put_dead_letter(&record) {
            tracing::error!(
                job_name = %job_name,
                job_id = %job_id,
                error = %store_err,
                "Dead letter could not be persisted"
            );
        }
    }
}
