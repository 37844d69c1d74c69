//! Terminal-failure signal for retry policies

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error carried by [`NoRetry`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Wraps an error to tell a retry policy to stop, even if attempts remain
///
/// Displays exactly as the wrapped cause and exposes it as its `source()`.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct NoRetry {
    #[source]
    source: BoxError,
}

impl NoRetry {
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self { source: cause.into() }
    }

    /// The wrapped error
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }

    pub fn into_cause(self) -> BoxError {
        self.source
    }
}

/// Wrap `cause` as a terminal failure, ready to return from a job body
pub fn no_retry(cause: impl Into<BoxError>) -> eyre::Report {
    eyre::Report::new(NoRetry::new(cause))
}

/// Whether a `NoRetry` appears anywhere in the report's chain
pub fn is_no_retry(err: &eyre::Report) -> bool {
    err.chain().any(|e| e.is::<NoRetry>())
}

/// Whether a `NoRetry` appears anywhere in the error's `source()` chain
pub fn is_no_retry_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<NoRetry>() {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[derive(Debug, Error)]
    #[error("renewal of {domain} failed")]
    struct RenewalError {
        domain: String,
        #[source]
        source: NoRetry,
    }

    #[test]
    fn test_display_matches_cause() {
        let err = NoRetry::new("authorization denied for a.test");
        assert_eq!(err.to_string(), "authorization denied for a.test");
    }

    #[test]
    fn test_source_is_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "key file unreadable");
        let err = NoRetry::new(io);

        let source = err.source().expect("cause should be the source");
        assert_eq!(source.to_string(), "key file unreadable");
        assert!(err.cause().is::<std::io::Error>());
    }

    #[test]
    fn test_into_cause() {
        let err = NoRetry::new(std::fmt::Error);
        assert!(err.into_cause().is::<std::fmt::Error>());
    }

    #[test]
    fn test_wraps_eyre_report() {
        let err = NoRetry::new(eyre::eyre!("rate limit exhausted"));
        assert_eq!(err.to_string(), "rate limit exhausted");
    }

    #[test]
    fn test_is_no_retry_direct() {
        assert!(is_no_retry(&no_retry("bad CSR")));
        assert!(!is_no_retry(&eyre::eyre!("temporary DNS failure")));
    }

    #[test]
    fn test_is_no_retry_through_context() {
        let err: eyre::Result<()> = Err(no_retry("bad CSR"));
        let wrapped = err.wrap_err("renewing a.test").unwrap_err();

        assert_eq!(wrapped.to_string(), "renewing a.test");
        assert!(is_no_retry(&wrapped));
    }

    #[test]
    fn test_is_no_retry_error_walks_sources() {
        let err = RenewalError {
            domain: "a.test".to_string(),
            source: NoRetry::new("account deactivated"),
        };
        assert!(is_no_retry_error(&err));

        let plain = std::io::Error::other("connection reset");
        assert!(!is_no_retry_error(&plain));
    }
}
