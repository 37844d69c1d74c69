//! Background job manager
//!
//! Runs submitted jobs on a bounded set of workers, drops submissions whose
//! name is already queued or running, and isolates job failures and panics
//! from the rest of the process.

mod config;
mod error;
mod job;
mod manager;
mod panic;
mod queue;

pub use config::{DEFAULT_MAX_CONCURRENT_JOBS, JobManagerConfig};
pub use error::JobManagerError;
pub use job::{JobLogger, TracingLogger};
pub use manager::JobManager;
pub use panic::{DiagnosticSink, PanicReport, TracingSink};
pub use queue::{JobStats, QueueState};
