//! Job types and the logging capability jobs carry

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::error;

use crate::retry::is_no_retry;

/// Boxed job body: called once, produces the future that does the work
pub(crate) type JobBody = Box<dyn FnOnce() -> BoxFuture<'static, eyre::Result<()>> + Send + 'static>;

/// Receives failures of job bodies
///
/// The manager calls [`JobLogger::error`] at most once per failed job. It is
/// fire-and-forget: nothing is propagated back to the submitter.
pub trait JobLogger: Send + Sync {
    /// Report a failure at error severity
    fn error(&self, message: &str, err: &eyre::Report);
}

/// `JobLogger` that writes to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    scope: Option<String>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scope (e.g. the subsystem submitting jobs) to every event
    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl JobLogger for TracingLogger {
    fn error(&self, message: &str, err: &eyre::Report) {
        let terminal = is_no_retry(err);
        match &self.scope {
            Some(scope) => error!(%scope, error = %err, terminal, "{}", message),
            None => error!(error = %err, terminal, "{}", message),
        }
    }
}

/// A queued unit of work
pub(crate) struct Job {
    /// Dedup key; empty means none
    pub name: String,
    pub body: JobBody,
    pub logger: Option<Arc<dyn JobLogger>>,
}

impl Job {
    pub(crate) fn new<F, Fut>(name: &str, logger: Option<Arc<dyn JobLogger>>, body: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            body: Box::new(move || body().boxed()),
            logger,
        }
    }

    pub(crate) fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("has_logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}
