//! jobmanager - bounded, deduplicating background job manager
//!
//! Runs maintenance work such as certificate renewals in the background
//! without blocking the caller and without running the same logical job
//! twice at once.
//!
//! # Core Concepts
//!
//! - **Bounded Workers**: at most `max-concurrent-jobs` workers drain the queue
//! - **Named Jobs**: a name that is queued or running drops later submissions
//! - **Fire and Forget**: failures go to the job's logger, panics to a diagnostic sink
//! - **Retry Primitives**: [`retry::NoRetry`] and [`retry::ATTEMPTS`] for retrying job bodies
//!
//! # Modules
//!
//! - [`jobs`] - Job manager, job logging and panic reporting
//! - [`retry`] - No-retry signal and attempt counter
//! - [`simulation`] - Simulated renewal jobs driven by the `jm` binary
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use jobmanager::{JobLogger, JobManager, JobManagerConfig, TracingLogger};
//!
//! let manager = JobManager::new(JobManagerConfig::default())?;
//! let logger: Arc<dyn JobLogger> = Arc::new(TracingLogger::scoped("maintenance"));
//! manager.submit(Some(logger), "renew:example.com", || async { renew("example.com").await });
//! ```

pub mod cli;
pub mod config;
pub mod jobs;
pub mod retry;
pub mod simulation;

// Re-export commonly used types
pub use config::Config;
pub use jobs::{
    DEFAULT_MAX_CONCURRENT_JOBS, DiagnosticSink, JobLogger, JobManager, JobManagerConfig, JobManagerError, JobStats,
    PanicReport, QueueState, TracingLogger, TracingSink,
};
pub use retry::{ATTEMPTS, NoRetry, current_attempt, is_no_retry, no_retry, with_attempt};
pub use simulation::{RenewalOutcome, SimulationConfig};
