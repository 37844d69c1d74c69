//! Job manager configuration

use serde::{Deserialize, Serialize};

use super::error::JobManagerError;

/// Default ceiling on concurrently running workers
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 1000;

/// Job manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobManagerConfig {
    /// Max concurrently running workers
    #[serde(rename = "max-concurrent-jobs", default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_max_concurrent_jobs() -> usize {
    DEFAULT_MAX_CONCURRENT_JOBS
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

impl JobManagerConfig {
    /// Config with the given worker ceiling
    pub fn with_max_concurrent_jobs(max_concurrent_jobs: usize) -> Self {
        Self { max_concurrent_jobs }
    }

    /// A ceiling of zero would accept jobs that never run
    pub fn validate(&self) -> Result<(), JobManagerError> {
        if self.max_concurrent_jobs == 0 {
            return Err(JobManagerError::InvalidConcurrency {
                value: self.max_concurrent_jobs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = JobManagerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = JobManagerConfig::with_max_concurrent_jobs(0);
        assert!(matches!(
            config.validate(),
            Err(JobManagerError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_deserialize_kebab_case() {
        let config: JobManagerConfig = serde_yaml::from_str("max-concurrent-jobs: 4").unwrap();
        assert_eq!(config.max_concurrent_jobs, 4);
    }

    #[test]
    fn test_deserialize_missing_field_uses_default() {
        let config: JobManagerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, JobManagerConfig::default());
    }
}
