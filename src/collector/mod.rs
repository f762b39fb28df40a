/// Collector module
///
/// This module groups all logic responsible for:
/// - Describing a unit of work (`CollectorUnit`)
/// - Retrying one unit with exponential backoff (`retry`)
/// - Fanning out all units and assembling the snapshot (`runner`)
///
/// Design notes:
/// - Source-specific logic MUST NOT live here (see `sources`)
/// - Units are always passed in by the caller; there is no registry here
///
pub mod retry;
pub mod runner;

use std::sync::Arc;

use futures_util::future::BoxFuture;

/// A unit of work as consumed by the orchestrator.
pub type SharedUnit<T> = Arc<dyn CollectorUnit<Output = T>>;

/// CollectorUnit is the contract between the orchestrator and one
/// external data source.
///
/// CONTRACT:
/// - Takes no input, produces `Output` or a recoverable error
/// - Must be safe to invoke again after a failure (retries)
/// - Holds no per-run state the orchestrator depends on
///
/// THREAD SAFETY:
/// - Must be Send + Sync, units are moved into spawned tasks
///
#[async_trait::async_trait]
pub trait CollectorUnit: Send + Sync {
    type Output: Send + 'static;

    /// Source name used for logging and as the key in the result.
    fn name(&self) -> &str;

    /// Performs a single attempt.
    async fn collect(&self) -> anyhow::Result<Self::Output>;
}

type UnitFn<T> = dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync;

/// Closure-backed unit.
///
/// Lets callers inject an operation without declaring a type for it:
///
/// ```ignore
/// let unit = FnCollector::shared("weather", || async { Ok(12u64) });
/// ```
pub struct FnCollector<T> {
    name: String,
    op: Box<UnitFn<T>>,
}

impl<T: Send + 'static> FnCollector<T> {
    pub fn new<F, Fut>(name: impl Into<String>, op: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            op: Box::new(move || Box::pin(op())),
        }
    }

    /// Same as `new`, already wrapped for the orchestrator.
    pub fn shared<F, Fut>(name: impl Into<String>, op: F) -> SharedUnit<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Arc::new(Self::new(name, op))
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> CollectorUnit for FnCollector<T> {
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> anyhow::Result<T> {
        (self.op)().await
    }
}
