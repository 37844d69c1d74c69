//! Panic capture at the worker boundary
//!
//! A panic inside a job body is caught by the worker that ran it. The
//! backtrace has to be taken while the panicking frames are still on the
//! stack, so a process panic hook records it into a thread-local slot
//! whenever the current thread is polling a job. The worker picks it up
//! after `catch_unwind` returns on the same thread.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use serde::Serialize;
use tracing::error;

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Install the capturing panic hook, chaining to whatever hook was set before
///
/// Panics outside job execution still go to the previous hook.
pub(crate) fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                CAPTURED.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as executing job code until dropped
struct CaptureGuard {
    previous: bool,
}

impl CaptureGuard {
    fn enter() -> Self {
        Self {
            previous: CAPTURING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.previous));
    }
}

/// Future adapter that records backtraces for panics raised while polling
pub(crate) struct CapturePanics<F> {
    inner: F,
}

impl<F> CapturePanics<F> {
    pub(crate) fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: Future + Unpin> Future for CapturePanics<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = CaptureGuard::enter();
        Pin::new(&mut self.inner).poll(cx)
    }
}

/// Run a synchronous closure with panic capture
pub(crate) fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Box<dyn Any + Send>> {
    let _guard = CaptureGuard::enter();
    panic::catch_unwind(AssertUnwindSafe(f))
}

/// A panic caught at the worker boundary
#[derive(Debug, Clone, Serialize)]
pub struct PanicReport {
    /// Name of the job that panicked; empty for anonymous jobs
    pub job: String,
    /// Panic payload rendered as text
    pub message: String,
    /// Backtrace of the panicking thread
    pub backtrace: String,
}

impl PanicReport {
    /// Build a report from a caught payload and the thread's captured backtrace
    pub(crate) fn capture(job: &str, payload: Box<dyn Any + Send>) -> Self {
        let backtrace = CAPTURED
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(Backtrace::force_capture);
        Self {
            job: job.to_string(),
            message: payload_message(payload.as_ref()),
            backtrace: backtrace.to_string(),
        }
    }
}

impl fmt::Display for PanicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.job.is_empty() {
            write!(f, "panic: job worker: {}\n{}", self.message, self.backtrace)
        } else {
            write!(f, "panic: job worker ({}): {}\n{}", self.job, self.message, self.backtrace)
        }
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Process diagnostic channel for panics caught in workers
pub trait DiagnosticSink: Send + Sync {
    fn report_panic(&self, report: &PanicReport);
}

/// Writes panic reports to `tracing` at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report_panic(&self, report: &PanicReport) {
        error!(job = %report.job, message = %report.message, "{}", report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_records_message_and_backtrace() {
        install_hook();

        let payload = catch(|| panic!("certificate state corrupted")).unwrap_err();
        let report = PanicReport::capture("renew:a.test", payload);

        assert_eq!(report.job, "renew:a.test");
        assert_eq!(report.message, "certificate state corrupted");
        assert!(!report.backtrace.is_empty());
    }

    #[test]
    fn test_catch_passes_through_value() {
        install_hook();
        assert_eq!(catch(|| 42).unwrap(), 42);
    }

    #[test]
    fn test_formatted_payload() {
        install_hook();

        let domain = "b.test";
        let payload = catch(|| panic!("bad state for {}", domain)).unwrap_err();
        let report = PanicReport::capture("", payload);

        assert_eq!(report.message, "bad state for b.test");
        assert!(report.to_string().starts_with("panic: job worker: bad state for b.test\n"));
    }

    #[test]
    fn test_non_string_payload() {
        install_hook();

        let payload = catch(|| std::panic::panic_any(7_u32)).unwrap_err();
        let report = PanicReport::capture("", payload);

        assert_eq!(report.message, "Box<dyn Any>");
    }

    #[test]
    fn test_guard_restores_flag() {
        assert!(!CAPTURING.with(Cell::get));
        {
            let _outer = CaptureGuard::enter();
            {
                let _inner = CaptureGuard::enter();
            }
            assert!(CAPTURING.with(Cell::get));
        }
        assert!(!CAPTURING.with(Cell::get));
    }

    #[test]
    fn test_report_display_names_job() {
        let report = PanicReport {
            job: "renew:c.test".to_string(),
            message: "boom".to_string(),
            backtrace: "frames".to_string(),
        };
        assert_eq!(report.to_string(), "panic: job worker (renew:c.test): boom\nframes");
    }
}
