use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    collector::{
        SharedUnit,
        retry::{RetryExecutor, RetryPolicy},
    },
    metrics::METRICS,
    schema::{CollectionResult, SourceOutcome, SourceReport},
    util,
};

/// Fans out a fixed list of units and assembles one snapshot.
///
/// DESIGN:
/// - One tokio task per unit, all started at the same logical instant
/// - Each task drives its own `RetryExecutor` loop (own counters, own timers)
/// - The run settles only when every task has settled
///
/// FAILURE SEMANTICS:
/// - Nothing is fatal; a `CollectionResult` is always returned
/// - A task that panics is caught here and recorded as `Failed`
///
/// LIFETIME:
/// - Tasks live in a `JoinSet`; dropping the run future (timeout,
///   `select!`) cancels the run's token and aborts every task
///
/// An optional deadline cancels every still-running unit when it elapses.
#[derive(Debug, Default, Clone)]
pub struct CollectionOrchestrator {
    policy: RetryPolicy,
    deadline: Option<Duration>,
    executor: RetryExecutor,
}

impl CollectionOrchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            deadline: None,
            executor: RetryExecutor,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs every unit to completion (or deadline) and builds the result.
    pub async fn run_all<T>(&self, units: Vec<SharedUnit<T>>) -> CollectionResult<T>
    where
        T: Send + 'static,
    {
        self.run_all_with_cancel(units, &CancellationToken::new()).await
    }

    /// Same as `run_all`, aborting all units once `cancel` fires.
    ///
    /// The caller's token is never cancelled by this call; the deadline
    /// only acts on a child token.
    pub async fn run_all_with_cancel<T>(
        &self,
        units: Vec<SharedUnit<T>>,
        cancel: &CancellationToken,
    ) -> CollectionResult<T>
    where
        T: Send + 'static,
    {
        // --------------------------------------------------
        // Timestamp first, before any unit starts
        // --------------------------------------------------
        let timestamp = Utc::now();
        let token = cancel.child_token();

        // Fires on every exit path, including the future being dropped
        let _cancel_on_drop = token.clone().drop_guard();

        let mut tasks = JoinSet::new();

        if let Some(deadline) = self.deadline {
            let token = token.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = sleep(deadline) => {
                        warn!(
                            "collection deadline of {}ms reached, cancelling remaining sources",
                            deadline.as_millis()
                        );
                        token.cancel();
                    }
                }
                None
            });
        }

        let mut seen = HashSet::new();
        for unit in &units {
            if !seen.insert(unit.name().to_string()) {
                warn!("duplicate source name '{}' in collection run", unit.name());
            }
        }

        // --------------------------------------------------
        // Fan-out
        // --------------------------------------------------
        let mut names = Vec::with_capacity(units.len());
        let mut progress = Vec::with_capacity(units.len());
        let mut slot_by_task = HashMap::with_capacity(units.len());

        for (slot, unit) in units.into_iter().enumerate() {
            let executor = self.executor;
            let policy = self.policy;
            let token = token.clone();
            let attempts = Arc::new(AtomicU32::new(0));

            names.push(unit.name().to_string());
            progress.push(attempts.clone());

            let handle = tasks.spawn(async move {
                let outcome = executor
                    .execute_with_progress(unit.as_ref(), &policy, &token, &attempts)
                    .await;
                Some((slot, outcome))
            });
            slot_by_task.insert(handle.id(), slot);
        }

        // --------------------------------------------------
        // Fan-in (barrier)
        // --------------------------------------------------
        let mut settled: Vec<Option<SourceOutcome<T>>> = names.iter().map(|_| None).collect();
        if settled.is_empty() {
            token.cancel();
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((slot, outcome))) => settled[slot] = Some(outcome),

                Ok(None) => {}

                // Escaped the retry loop entirely
                Err(e) => {
                    let Some(&slot) = slot_by_task.get(&e.id()) else {
                        continue;
                    };
                    let message = if e.is_panic() {
                        util::panic_message(e.into_panic().as_ref())
                    } else {
                        "collector task was aborted".to_string()
                    };

                    error!("[Collector:{}] escaped retry loop: {}", names[slot], message);
                    METRICS.escaped_failures.fetch_add(1, Ordering::Relaxed);

                    settled[slot] = Some(SourceOutcome::Failed {
                        reason: message,
                        attempts: progress[slot].load(Ordering::Relaxed),
                    });
                }
            }

            // Every unit settled, only the deadline timer can be left
            if settled.iter().all(Option::is_some) {
                token.cancel();
            }
        }

        let mut sources = Vec::with_capacity(names.len());
        let mut errors = Vec::new();

        for (name, outcome) in names.into_iter().zip(settled) {
            let outcome = outcome.unwrap_or_else(|| SourceOutcome::Failed {
                reason: "collector task never settled".to_string(),
                attempts: 0,
            });

            if let Some(text) = outcome.error_text() {
                errors.push(format!("{}: {}", name, text));
            }

            sources.push(SourceReport { name, outcome });
        }

        METRICS.runs_completed.fetch_add(1, Ordering::Relaxed);

        let result = CollectionResult {
            timestamp,
            sources,
            errors,
        };

        info!(
            "collection run finished: {}/{} sources collected",
            result.collected_count(),
            result.sources.len()
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FnCollector;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::AtomicU32;
    use tokio::time::Instant;

    const SOURCES: [&str; 4] = ["weather", "alerts", "traffic", "gauges"];

    fn ok(name: &str, value: u64) -> SharedUnit<u64> {
        FnCollector::shared(name, move || async move { Ok(value) })
    }

    fn always_failing(name: &str) -> SharedUnit<u64> {
        let message = format!("{} endpoint unreachable", name);
        FnCollector::shared(name, move || {
            let message = message.clone();
            async move { Err(anyhow::anyhow!(message)) }
        })
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn all_sources_succeed_without_delay() {
        let units = SOURCES
            .iter()
            .enumerate()
            .map(|(i, name)| ok(name, i as u64 * 10))
            .collect();
        let start = Instant::now();

        let result = CollectionOrchestrator::default().run_all(units).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(result.errors.is_empty());
        assert!(result.is_complete());
        assert_eq!(result.value("weather"), Some(&0));
        assert_eq!(result.value("gauges"), Some(&30));
        assert_eq!(
            result.sources.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            SOURCES
        );
    }

    #[tokio::test(start_paused = true)]
    async fn all_sources_failing_still_yields_complete_result() {
        let units = SOURCES.iter().map(|name| always_failing(name)).collect();

        let result = CollectionOrchestrator::new(fast_policy()).run_all(units).await;

        assert_eq!(result.sources.len(), 4);
        assert_eq!(result.collected_count(), 0);
        for name in SOURCES {
            assert_eq!(result.value(name), None);
            assert_eq!(result.get(name).map(SourceOutcome::attempts), Some(3));
        }
        assert_eq!(
            result.errors,
            vec![
                "weather: weather endpoint unreachable",
                "alerts: alerts endpoint unreachable",
                "traffic: traffic endpoint unreachable",
                "gauges: gauges endpoint unreachable",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failing_source_does_not_delay_others() {
        let finished_at = Arc::new(Mutex::new(None));
        let start = Instant::now();

        let slow_ok = FnCollector::shared("alerts", {
            let finished_at = finished_at.clone();
            move || {
                let finished_at = finished_at.clone();
                async move {
                    sleep(Duration::from_millis(500)).await;
                    *finished_at.lock().unwrap() = Some(Instant::now());
                    Ok(3u64)
                }
            }
        });

        let units = vec![always_failing("gauges"), slow_ok];

        // default policy: 1000ms + 2000ms of backoff for the failing source
        let result = CollectionOrchestrator::default().run_all(units).await;

        assert_eq!(result.value("alerts"), Some(&3));
        assert_eq!(result.value("gauges"), None);
        assert_eq!(
            finished_at.lock().unwrap().map(|t| t - start),
            Some(Duration::from_millis(500))
        );
        // max over sources, not the sum
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn panic_before_first_attempt_is_caught() {
        let defective = FnCollector::<u64>::shared(
            "traffic",
            || -> std::future::Ready<anyhow::Result<u64>> {
                panic!("defect before first attempt")
            },
        );
        let units = vec![ok("weather", 1), ok("alerts", 2), defective, ok("gauges", 4)];

        let result = CollectionOrchestrator::new(fast_policy()).run_all(units).await;

        assert_eq!(result.sources.len(), 4);
        assert_eq!(result.value("traffic"), None);
        assert_eq!(
            result.get("traffic"),
            Some(&SourceOutcome::Failed {
                reason: "defect before first attempt".into(),
                attempts: 1,
            })
        );
        assert_eq!(result.errors, vec!["traffic: defect before first attempt"]);
        assert_eq!(result.collected_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_after_retries_keeps_attempt_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let unit = FnCollector::<u64>::shared("gauges", {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(anyhow::anyhow!("HTTP 502"))
                    } else {
                        panic!("decoder invariant broken")
                    }
                }
            }
        });

        let result = CollectionOrchestrator::new(fast_policy())
            .run_all(vec![unit, ok("weather", 1)])
            .await;

        assert_eq!(
            result.get("gauges"),
            Some(&SourceOutcome::Failed {
                reason: "decoder invariant broken".into(),
                attempts: 3,
            })
        );
        assert_eq!(result.errors, vec!["gauges: decoder invariant broken"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_run_stops_every_unit() {
        let calls = Arc::new(AtomicU32::new(0));
        let unit = FnCollector::<u64>::shared("alerts", {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow::anyhow!("HTTP 500")) }
            }
        });
        let caller = CancellationToken::new();
        let orchestrator = CollectionOrchestrator::new(
            RetryPolicy::new(3, Duration::from_millis(1000)).unwrap(),
        );

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            orchestrator.run_all_with_cancel(vec![unit], &caller),
        )
        .await;
        assert!(timed_out.is_err());

        sleep(Duration::from_secs(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!caller.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_timer_does_not_outlive_a_fast_run() {
        let start = Instant::now();

        let result = CollectionOrchestrator::default()
            .with_deadline(Duration::from_secs(60))
            .run_all(vec![ok("weather", 1)])
            .await;

        assert_eq!(result.value("weather"), Some(&1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timestamp_is_captured_before_sources_start() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let units = SOURCES
            .iter()
            .map(|name| {
                let started = started.clone();
                FnCollector::shared(*name, move || {
                    started.lock().unwrap().push(Utc::now());
                    async { Ok(1u64) }
                })
            })
            .collect();

        let result = CollectionOrchestrator::default().run_all(units).await;

        let started = started.lock().unwrap();
        assert_eq!(started.len(), 4);
        assert!(started.iter().all(|t| result.timestamp <= *t));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_runs_differ_only_in_timestamp() {
        let build = || {
            let calls = Arc::new(AtomicU32::new(0));
            vec![
                ok("weather", 11),
                always_failing("alerts"),
                FnCollector::shared("traffic", move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(anyhow::anyhow!("rate limited"))
                        } else {
                            Ok(5u64)
                        }
                    }
                }),
            ]
        };
        let orchestrator = CollectionOrchestrator::new(fast_policy());

        let first = orchestrator.run_all(build()).await;
        let second = orchestrator.run_all(build()).await;

        assert_eq!(first.sources, second.sources);
        assert_eq!(first.errors, second.errors);
        assert_eq!(first.value("traffic"), Some(&5));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_remaining_sources() {
        let units = vec![ok("weather", 9), always_failing("gauges")];
        let start = Instant::now();

        let result = CollectionOrchestrator::new(
            RetryPolicy::new(3, Duration::from_secs(10)).unwrap(),
        )
        .with_deadline(Duration::from_secs(5))
        .run_all(units)
        .await;

        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(result.value("weather"), Some(&9));
        assert_eq!(
            result.get("gauges"),
            Some(&SourceOutcome::Cancelled { attempts: 1 })
        );
        assert_eq!(result.errors, vec!["gauges: cancelled"]);
    }

    #[tokio::test]
    async fn external_cancel_marks_every_source_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let units = SOURCES.iter().map(|name| ok(name, 1)).collect();

        let result = CollectionOrchestrator::default()
            .run_all_with_cancel(units, &cancel)
            .await;

        assert_eq!(result.collected_count(), 0);
        assert!(
            result
                .sources
                .iter()
                .all(|r| r.outcome == SourceOutcome::Cancelled { attempts: 0 })
        );
        assert_eq!(result.errors.len(), 4);
    }

    #[tokio::test]
    async fn empty_unit_list_yields_empty_result() {
        let result = CollectionOrchestrator::default()
            .run_all(Vec::<SharedUnit<u64>>::new())
            .await;

        assert!(result.sources.is_empty());
        assert!(result.errors.is_empty());
        assert!(result.is_complete());
    }
}
