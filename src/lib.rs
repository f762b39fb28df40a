//! Resilient multi-source status collection.
//!
//! Gathers readings from several independent, unreliable feeds
//! (weather observations, weather alerts, traffic incidents, river
//! gauges) concurrently, retries each with exponential backoff and
//! assembles one [`schema::CollectionResult`] snapshot.
//!
//! ```ignore
//! use status_snapshot_collector::collector::{FnCollector, runner::CollectionOrchestrator};
//!
//! let units = vec![
//!     FnCollector::shared("weather", || async { Ok(12u64) }),
//!     FnCollector::shared("gauges", || async { Err(anyhow::anyhow!("HTTP 503")) }),
//! ];
//! let result = CollectionOrchestrator::default().run_all(units).await;
//! assert_eq!(result.value("weather"), Some(&12));
//! ```
//!
//! - `config`:    Configuration structs loaded from JSON
//! - `schema`:    Collection result / per-source outcome types
//! - `util`:      Backoff arithmetic and error formatting
//! - `metrics`:   Global runtime counters
//! - `collector`: Unit contract, retry executor and orchestrator
//! - `sources`:   HTTP-backed units for the configured feeds

pub mod collector;
pub mod config;
pub mod metrics;
pub mod schema;
pub mod sources;
pub mod util;
