/// Utility helpers shared by the retry executor and the orchestrator.
///
/// This module contains:
/// - Backoff arithmetic
/// - Error / panic payload formatting
///
/// IMPORTANT:
/// - No source-specific logic should live here.
/// - Everything in here must stay pure and deterministic.
///

use std::any::Any;
use std::time::Duration;

/// Returns the delay to wait after the failed attempt `attempt` (0-based).
///
/// Formula:
///     base * 2^attempt
///
/// Examples (base = 1000ms):
/// - attempt 0 -> 1000ms
/// - attempt 1 -> 2000ms
/// - attempt 2 -> 4000ms
///
/// No jitter and no cap. Overflow saturates at `Duration::MAX`.
///
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if let Some(factor) = 2u32.checked_pow(attempt) {
        return base.saturating_mul(factor);
    }
    if base.is_zero() {
        return Duration::ZERO;
    }

    // 2^attempt no longer fits in u32, redo it in u128 nanoseconds
    1u128
        .checked_shl(attempt)
        .and_then(|factor| base.as_nanos().checked_mul(factor))
        .and_then(|nanos| {
            let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
            Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
        })
        .unwrap_or(Duration::MAX)
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Renders an error chain into a single log-friendly line.
///
/// `anyhow` alternate formatting joins causes with ": ", which keeps
/// the `[Collector:<name>] ... failed: <message>` lines on one line.
pub fn error_message(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

/// Extracts a readable message from a panic payload.
///
/// Panics raised with `panic!("literal")` carry a `&'static str`,
/// formatted panics carry a `String`. Anything else is opaque.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 10), Duration::from_millis(102_400));
    }

    #[test]
    fn backoff_keeps_doubling_past_u32_factor() {
        let ms = Duration::from_millis(1);
        assert_eq!(backoff_delay(ms, 31), Duration::from_millis(1 << 31));
        assert_eq!(backoff_delay(ms, 32), Duration::from_millis(1 << 32));
        assert_eq!(backoff_delay(ms, 33), Duration::from_millis(1 << 33));
        // 2^64 ms still fits in a Duration
        assert_eq!(
            backoff_delay(ms, 64),
            Duration::from_millis(u64::MAX) + Duration::from_millis(1)
        );
    }

    #[test]
    fn backoff_saturates_at_duration_max() {
        assert_eq!(backoff_delay(Duration::from_secs(u64::MAX / 2), 40), Duration::MAX);
        assert_eq!(backoff_delay(Duration::from_millis(1), 100), Duration::MAX);
        assert_eq!(backoff_delay(Duration::from_nanos(1), 200), Duration::MAX);
        assert_eq!(backoff_delay(Duration::ZERO, 200), Duration::ZERO);
    }

    #[test]
    fn error_message_includes_cause_chain() {
        let err = anyhow::anyhow!("connection reset").context("GET https://example.invalid");
        assert_eq!(error_message(&err), "GET https://example.invalid: connection reset");
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let formatted: Box<dyn Any + Send> = Box::new(format!("boom {}", 7));
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(literal.as_ref()), "boom");
        assert_eq!(panic_message(formatted.as_ref()), "boom 7");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
