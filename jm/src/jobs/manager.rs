//! Job manager implementation

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::config::JobManagerConfig;
use super::error::JobManagerError;
use super::job::{Job, JobLogger};
use super::panic::{self, CapturePanics, DiagnosticSink, PanicReport, TracingSink};
use super::queue::{JobStats, QueueState};

/// Internal state protected by mutex
struct ManagerState {
    /// Pending jobs in submission order
    queue: VecDeque<Job>,

    /// Names of jobs currently queued or executing
    names: HashSet<String>,

    /// Worker loops that have not returned yet
    active_workers: usize,

    /// Statistics
    stats: JobStats,
}

impl ManagerState {
    fn is_idle(&self) -> bool {
        self.active_workers == 0 && self.queue.is_empty()
    }
}

struct Shared {
    max_concurrent_jobs: usize,
    state: Mutex<ManagerState>,
    idle: Notify,
}

impl Shared {
    // Job bodies never run under this lock, so poisoning can only come from
    // a bug in the manager itself; the state is still consistent then.
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A counted worker. The count is returned exactly once: by `next_job` when
/// the queue is drained, or on drop if the worker dies any other way.
struct WorkerSlot {
    shared: Arc<Shared>,
    released: bool,
}

impl WorkerSlot {
    /// Caller must already have counted this worker in `active_workers`
    fn new(shared: Arc<Shared>) -> Self {
        Self { shared, released: false }
    }

    /// Pop the next job, or give the slot back if there is none
    fn next_job(&mut self) -> Option<Job> {
        let mut state = self.shared.lock();
        if let Some(job) = state.queue.pop_front() {
            return Some(job);
        }

        state.active_workers -= 1;
        self.released = true;
        let idle = state.active_workers == 0;
        drop(state);

        if idle {
            self.shared.idle.notify_waiters();
        }
        None
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let mut state = self.shared.lock();
        state.active_workers -= 1;
        let idle = state.is_idle();
        let queued = state.queue.len();
        drop(state);

        warn!(queued, "JobManager: worker exited before draining the queue");
        if idle {
            self.shared.idle.notify_waiters();
        }
    }
}

/// Holds a job's name reserved until the job is finished with
struct NameReservation {
    shared: Arc<Shared>,
    name: String,
}

impl Drop for NameReservation {
    fn drop(&mut self) {
        if !self.name.is_empty() {
            self.shared.lock().names.remove(&self.name);
        }
    }
}

/// The JobManager runs submitted jobs in the background with a ceiling on
/// concurrent workers and at most one queued-or-running job per name.
///
/// Cloning is cheap; clones share one queue.
#[derive(Clone)]
pub struct JobManager {
    shared: Arc<Shared>,
    runtime: Handle,
    sink: Arc<dyn DiagnosticSink>,
}

impl JobManager {
    /// Create a job manager whose workers run on the current Tokio runtime
    pub fn new(config: JobManagerConfig) -> Result<Self, JobManagerError> {
        debug!(?config, "JobManager::new: called");
        let runtime = Handle::try_current()?;
        Self::with_runtime(config, runtime)
    }

    /// Create a job manager whose workers run on the given runtime
    pub fn with_runtime(config: JobManagerConfig, runtime: Handle) -> Result<Self, JobManagerError> {
        debug!(?config, "JobManager::with_runtime: called");
        config.validate()?;
        panic::install_hook();

        info!(max_concurrent_jobs = config.max_concurrent_jobs, "Job manager created");
        Ok(Self {
            shared: Arc::new(Shared {
                max_concurrent_jobs: config.max_concurrent_jobs,
                state: Mutex::new(ManagerState {
                    queue: VecDeque::new(),
                    names: HashSet::new(),
                    active_workers: 0,
                    stats: JobStats::default(),
                }),
                idle: Notify::new(),
            }),
            runtime,
            sink: Arc::new(TracingSink),
        })
    }

    /// Route panic reports to `sink` instead of `tracing`
    ///
    /// Applies to this handle and clones made from it afterwards.
    pub fn with_diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.shared.max_concurrent_jobs
    }

    /// Enqueue a job and return immediately
    ///
    /// If `name` is non-empty and a job with the same name is already queued
    /// or running, the submission is dropped without error. An empty name
    /// disables duplicate detection. The check is best-effort: a job that
    /// finished a moment ago no longer holds its name.
    ///
    /// A failure returned by `body` is passed to `logger` if one is given.
    /// A panic in `body` is caught and sent to the diagnostic sink. Neither
    /// reaches the caller.
    pub fn submit<F, Fut>(&self, logger: Option<Arc<dyn JobLogger>>, name: &str, body: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        debug!(%name, "JobManager::submit: called");
        let mut state = self.shared.lock();

        if !name.is_empty() {
            if state.names.contains(name) {
                debug!(%name, "JobManager::submit: already queued or running, dropping");
                state.stats.deduplicated += 1;
                return;
            }
            state.names.insert(name.to_string());
        }

        state.queue.push_back(Job::new(name, logger, body));
        state.stats.submitted += 1;

        if state.active_workers >= self.shared.max_concurrent_jobs {
            debug!(%name, queued = state.queue.len(), "JobManager::submit: at worker limit, queued");
            return;
        }

        state.active_workers += 1;
        state.stats.peak_workers = state.stats.peak_workers.max(state.active_workers);
        debug!(%name, active_workers = state.active_workers, "JobManager::submit: starting worker");
        drop(state);

        // Spawned outside the lock: a runtime that is shutting down drops the
        // future right away, and the slot's drop needs the lock.
        let slot = WorkerSlot::new(self.shared.clone());
        self.runtime.spawn(self.clone().run_worker(slot));
    }

    /// Drain the queue one job at a time, then exit
    async fn run_worker(self, mut slot: WorkerSlot) {
        debug!("JobManager::run_worker: started");
        while let Some(job) = slot.next_job() {
            self.run_job(job).await;
        }
        debug!("JobManager::run_worker: queue empty, exiting");
    }

    async fn run_job(&self, job: Job) {
        let named = job.is_named();
        let Job { name, body, logger } = job;
        let _reservation = NameReservation {
            shared: self.shared.clone(),
            name: name.clone(),
        };
        debug!(%name, named, "JobManager::run_job: running");

        let work = CapturePanics::new(async move { body().await }.boxed());
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(())) => {
                debug!(%name, "JobManager::run_job: succeeded");
                self.shared.lock().stats.succeeded += 1;
            }
            Ok(Err(err)) => {
                debug!(%name, error = %err, "JobManager::run_job: failed");
                self.shared.lock().stats.failed += 1;
                if let Some(logger) = logger
                    && let Err(payload) = panic::catch(|| logger.error("job failed", &err))
                {
                    self.sink.report_panic(&PanicReport::capture(&name, payload));
                }
            }
            Err(payload) => {
                let report = PanicReport::capture(&name, payload);
                debug!(%name, message = %report.message, "JobManager::run_job: panicked");
                self.shared.lock().stats.panicked += 1;
                self.sink.report_panic(&report);
            }
        }
    }

    /// Whether a job with this name is queued or running
    pub fn is_reserved(&self, name: &str) -> bool {
        !name.is_empty() && self.shared.lock().names.contains(name)
    }

    /// Get current queue state
    pub fn queue_state(&self) -> QueueState {
        let state = self.shared.lock();
        QueueState {
            active_workers: state.active_workers,
            queued: state.queue.len(),
            reserved: state.names.len(),
            stats: state.stats.clone(),
        }
    }

    /// Get the job statistics
    pub fn stats(&self) -> JobStats {
        self.shared.lock().stats.clone()
    }

    /// Wait until the queue is empty and every worker has exited
    ///
    /// Jobs submitted while waiting extend the wait.
    pub async fn wait_idle(&self) {
        debug!("JobManager::wait_idle: called");
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.lock().is_idle() {
                debug!("JobManager::wait_idle: idle");
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.queue_state();
        f.debug_struct("JobManager")
            .field("max_concurrent_jobs", &self.shared.max_concurrent_jobs)
            .field("active_workers", &state.active_workers)
            .field("queued", &state.queued)
            .finish_non_exhaustive()
    }
}
