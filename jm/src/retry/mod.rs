//! Primitives consumed by retry policies layered over job bodies
//!
//! The job manager never retries anything itself. A job body that retries
//! reads its attempt number from [`ATTEMPTS`] and returns [`NoRetry`] to end
//! retries early.

mod attempts;
mod no_retry;

pub use attempts::{ATTEMPTS, current_attempt, is_first_attempt, with_attempt};
pub use no_retry::{BoxError, NoRetry, is_no_retry, is_no_retry_error, no_retry};
