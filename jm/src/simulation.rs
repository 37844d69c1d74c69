//! Simulated certificate renewals
//!
//! Stand-in job bodies for driving the job manager from the `jm` binary:
//! each domain gets a renewal that sleeps, then succeeds, fails, fails
//! terminally or panics depending on configuration.

use std::sync::Arc;
use std::time::Duration;

use eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::jobs::{JobLogger, JobManager};
use crate::retry::{current_attempt, no_retry};

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Domains renewed when none are given on the command line
    pub domains: Vec<String>,

    /// Time each renewal takes in milliseconds
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Domains whose renewal fails with a retryable error
    pub fail: Vec<String>,

    /// Domains whose renewal fails terminally
    pub reject: Vec<String>,

    /// Domains whose renewal panics
    pub panic: Vec<String>,

    /// Times each renewal is submitted; repeats exercise deduplication
    pub repeat: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            domains: vec!["example.com".to_string(), "example.org".to_string()],
            delay_ms: 250,
            fail: Vec::new(),
            reject: Vec::new(),
            panic: Vec::new(),
            repeat: 1,
        }
    }
}

impl SimulationConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Outcome configured for `domain`; panic wins over reject over fail
    pub fn outcome_for(&self, domain: &str) -> RenewalOutcome {
        let listed = |list: &[String]| list.iter().any(|d| d == domain);
        if listed(&self.panic) {
            RenewalOutcome::Panic
        } else if listed(&self.reject) {
            RenewalOutcome::Reject
        } else if listed(&self.fail) {
            RenewalOutcome::Fail
        } else {
            RenewalOutcome::Renew
        }
    }
}

/// What a simulated renewal does once its delay is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    Renew,
    Fail,
    Reject,
    Panic,
}

/// Dedup name for a domain's renewal job
pub fn job_name(domain: &str) -> String {
    format!("renew:{}", domain)
}

/// Simulated renewal body
pub async fn renew(domain: String, outcome: RenewalOutcome, delay: Duration) -> eyre::Result<()> {
    let attempt = current_attempt();
    debug!(%domain, attempt, ?outcome, "renew: called");
    tokio::time::sleep(delay).await;

    match outcome {
        RenewalOutcome::Renew => {
            info!(%domain, attempt, "Certificate renewed");
            Ok(())
        }
        RenewalOutcome::Fail => Err(eyre!("ACME server unavailable while renewing {}", domain)),
        RenewalOutcome::Reject => Err(no_retry(eyre!("authorization for {} was rejected", domain))),
        RenewalOutcome::Panic => panic!("certificate cache for {} is corrupted", domain),
    }
}

/// Submit a renewal job per domain, `config.repeat` times over
///
/// Returns how many submissions were made; the manager decides how many it keeps.
pub fn submit_renewals(
    manager: &JobManager,
    logger: Option<Arc<dyn JobLogger>>,
    domains: &[String],
    config: &SimulationConfig,
) -> usize {
    debug!(domains = domains.len(), repeat = config.repeat, "submit_renewals: called");
    let mut submitted = 0;
    for _ in 0..config.repeat.max(1) {
        for domain in domains {
            let outcome = config.outcome_for(domain);
            let delay = config.delay();
            let domain = domain.clone();
            manager.submit(logger.clone(), &job_name(&domain), move || renew(domain, outcome, delay));
            submitted += 1;
        }
    }
    submitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobManagerConfig;
    use crate::retry::{is_no_retry, with_attempt};

    fn config() -> SimulationConfig {
        SimulationConfig {
            domains: vec!["a.test".to_string()],
            delay_ms: 0,
            fail: vec!["b.test".to_string()],
            reject: vec!["c.test".to_string(), "d.test".to_string()],
            panic: vec!["d.test".to_string()],
            repeat: 1,
        }
    }

    #[test]
    fn test_outcome_precedence() {
        let config = config();
        assert_eq!(config.outcome_for("a.test"), RenewalOutcome::Renew);
        assert_eq!(config.outcome_for("b.test"), RenewalOutcome::Fail);
        assert_eq!(config.outcome_for("c.test"), RenewalOutcome::Reject);
        assert_eq!(config.outcome_for("d.test"), RenewalOutcome::Panic);
    }

    #[test]
    fn test_job_name() {
        assert_eq!(job_name("example.com"), "renew:example.com");
    }

    #[tokio::test]
    async fn test_renew_outcomes() {
        let delay = Duration::ZERO;
        assert!(renew("a.test".into(), RenewalOutcome::Renew, delay).await.is_ok());

        let fail = renew("b.test".into(), RenewalOutcome::Fail, delay).await.unwrap_err();
        assert!(!is_no_retry(&fail));

        let reject = renew("c.test".into(), RenewalOutcome::Reject, delay).await.unwrap_err();
        assert!(is_no_retry(&reject));
        assert_eq!(reject.to_string(), "authorization for c.test was rejected");
    }

    #[tokio::test]
    async fn test_renew_within_attempt_scope() {
        let result = with_attempt(2, renew("a.test".into(), RenewalOutcome::Renew, Duration::ZERO)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_submit_renewals_repeats_are_deduplicated() {
        let manager = JobManager::new(JobManagerConfig::with_max_concurrent_jobs(1)).unwrap();
        let domains = vec!["a.test".to_string(), "b.test".to_string()];
        let config = SimulationConfig {
            repeat: 3,
            ..config()
        };

        let submitted = submit_renewals(&manager, None, &domains, &config);
        manager.wait_idle().await;

        let stats = manager.stats();
        assert_eq!(submitted, 6);
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.deduplicated, 4);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
    }
}
