//! Attempt counter carried in the task's context

use std::future::Future;

tokio::task_local! {
    /// How many times the operation running in this task has been attempted.
    /// Unset or zero means first attempt.
    pub static ATTEMPTS: u32;
}

/// Attempt number for the current task, zero when unset
pub fn current_attempt() -> u32 {
    ATTEMPTS.try_with(|attempts| *attempts).unwrap_or(0)
}

pub fn is_first_attempt() -> bool {
    current_attempt() == 0
}

/// Run `fut` with the attempt counter set to `attempt`
///
/// Task-locals are not inherited by spawned tasks; thread the value
/// explicitly across `tokio::spawn`.
pub async fn with_attempt<F: Future>(attempt: u32, fut: F) -> F::Output {
    ATTEMPTS.scope(attempt, fut).await
}
