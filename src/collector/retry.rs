use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, error, warn};
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{collector::CollectorUnit, metrics::METRICS, schema::SourceOutcome, util};

/// Invalid retry configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_retries must be at least 1, got {0}")]
    ZeroRetries(u32),
}

/// Retry configuration for one executor invocation.
///
/// - `max_retries`: total attempts, including the first one (≥ 1)
/// - `base_delay`: delay after the first failure; doubles per attempt
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

    pub fn new(max_retries: u32, base_delay: Duration) -> Result<Self, PolicyError> {
        if max_retries == 0 {
            return Err(PolicyError::ZeroRetries(max_retries));
        }

        Ok(Self {
            max_retries,
            base_delay,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Sleep inserted after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        util::backoff_delay(self.base_delay, attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            base_delay: Self::DEFAULT_BASE_DELAY,
        }
    }
}

// ------------------------------------------------------------
// Attempt state
// ------------------------------------------------------------
//
// Lives for exactly one `execute` call.
//
#[derive(Debug, Default)]
struct AttemptState {
    /// Attempts started so far
    started: u32,

    /// Sum of all backoff sleeps entered
    backoff: Duration,

    last_error: Option<String>,
}

/// Retry-with-backoff wrapper around one unit of work.
///
/// State machine per invocation:
///
/// ```text
/// idle -> attempting(i) -> succeeded
///                       -> attempting(i + 1)   if i + 1 < max
///                       -> exhausted           otherwise
/// ```
///
/// plus `cancelled` from any non-terminal state.
///
/// GUARANTEES:
/// - Attempts for one unit never overlap
/// - Returns immediately on the first success
/// - Never returns an error; failures become `SourceOutcome::Failed`
///
/// The executor holds no data and can be shared freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryExecutor;

impl RetryExecutor {
    pub async fn execute<U>(
        &self,
        unit: &U,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> SourceOutcome<U::Output>
    where
        U: CollectorUnit + ?Sized,
    {
        self.execute_with_progress(unit, policy, cancel, &AtomicU32::new(0))
            .await
    }

    /// Same as `execute`, publishing the number of attempts started to
    /// `progress` before each attempt runs.
    ///
    /// Lets a caller report how far a unit got when the attempt itself
    /// panics and the returned outcome is never seen.
    pub async fn execute_with_progress<U>(
        &self,
        unit: &U,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        progress: &AtomicU32,
    ) -> SourceOutcome<U::Output>
    where
        U: CollectorUnit + ?Sized,
    {
        let name = unit.name();
        let max = policy.max_retries();
        let mut state = AttemptState::default();

        while state.started < max {
            if cancel.is_cancelled() {
                return Self::cancelled(name, &state);
            }

            let attempt = state.started;
            state.started += 1;
            progress.store(state.started, Ordering::Relaxed);
            METRICS.attempts.fetch_add(1, Ordering::Relaxed);

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Self::cancelled(name, &state),
                r = unit.collect() => r,
            };

            let err = match result {
                Ok(value) => {
                    debug!(
                        "[Collector:{}] succeeded after {} attempt(s), {}ms backoff",
                        name,
                        state.started,
                        state.backoff.as_millis()
                    );
                    METRICS.sources_collected.fetch_add(1, Ordering::Relaxed);
                    return SourceOutcome::Collected {
                        value,
                        attempts: state.started,
                    };
                }
                Err(err) => err,
            };

            METRICS.attempt_failures.fetch_add(1, Ordering::Relaxed);
            let message = util::error_message(&err);

            if state.started >= max {
                error!("[Collector:{}] All {} attempts failed: {}", name, max, message);
                state.last_error = Some(message);
                break;
            }

            let delay = policy.delay_for(attempt);
            warn!(
                "[Collector:{}] attempt {}/{} failed: {}. Retrying in {}ms...",
                name,
                state.started,
                max,
                message,
                delay.as_millis()
            );
            state.last_error = Some(message);
            state.backoff = state.backoff.saturating_add(delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Self::cancelled(name, &state),
                _ = sleep(delay) => {}
            }
        }

        METRICS.sources_exhausted.fetch_add(1, Ordering::Relaxed);
        SourceOutcome::Failed {
            reason: state
                .last_error
                .unwrap_or_else(|| "no attempt was made".to_string()),
            attempts: state.started,
        }
    }

    fn cancelled<T>(name: &str, state: &AttemptState) -> SourceOutcome<T> {
        warn!(
            "[Collector:{}] cancelled after {} attempt(s)",
            name, state.started
        );
        METRICS.sources_cancelled.fetch_add(1, Ordering::Relaxed);
        SourceOutcome::Cancelled {
            attempts: state.started,
        }
    }
}
