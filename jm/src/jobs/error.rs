//! Job manager error types

use thiserror::Error;

/// Errors raised while constructing a job manager
///
/// Submitting work never fails; job outcomes are reported through the
/// job's logger and the manager's diagnostic sink instead.
#[derive(Debug, Error)]
pub enum JobManagerError {
    #[error("No Tokio runtime available to run job workers")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("max-concurrent-jobs must be at least 1 (got {value})")]
    InvalidConcurrency { value: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_concurrency_message() {
        let err = JobManagerError::InvalidConcurrency { value: 0 };

        let msg = err.to_string();
        assert!(msg.contains("max-concurrent-jobs"));
        assert!(msg.contains("0"));
    }

    #[test]
    fn test_no_runtime_outside_tokio() {
        let err: JobManagerError = tokio::runtime::Handle::try_current().unwrap_err().into();
        assert!(matches!(err, JobManagerError::NoRuntime(_)));
    }
}
