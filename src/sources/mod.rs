//! Source adapter registry and unit factory
//!
//! This module provides:
//! - Central registration of all supported feed kinds
//! - A factory turning configuration into orchestrator units
//!
//! All feed-specific payload handling lives in the adapter modules.
//! The orchestrator only ever sees `CollectorUnit`s.

pub mod adapter;
pub mod http;
mod alerts;
mod gauges;
mod traffic;
mod weather;

use std::sync::Arc;

use adapter::SourceAdapter;

use crate::{collector::SharedUnit, config::Config};

/// Returns a source adapter by kind.
///
/// CONTRACT:
/// - `kind` MUST match the `sources[].kind` field in config.json
/// - Kind names are lowercase and stable
///
/// RETURNS:
/// - `None` if the kind is unknown
///
pub fn get_adapter(kind: &str) -> Option<Arc<dyn SourceAdapter>> {
    match kind {
        "weather" => Some(Arc::new(weather::WeatherAdapter)),
        "alerts" => Some(Arc::new(alerts::AlertsAdapter)),
        "traffic" => Some(Arc::new(traffic::TrafficAdapter)),
        "gauges" => Some(Arc::new(gauges::GaugesAdapter)),
        _ => None,
    }
}

/// Builds one HTTP-backed unit per enabled source, in configuration order.
///
/// Every unit shares the same `reqwest::Client` (connection pool).
pub fn build_units(cfg: &Config) -> anyhow::Result<Vec<SharedUnit<u64>>> {
    let client = http::build_client(&cfg.http)?;
    let mut units: Vec<SharedUnit<u64>> = Vec::new();

    for source in cfg.enabled_sources() {
        let adapter = get_adapter(&source.kind)
            .ok_or_else(|| anyhow::anyhow!("unsupported source kind '{}'", source.kind))?;

        let url = match (&source.url, adapter.default_url()) {
            (Some(url), _) => url.clone(),
            (None, Some(url)) => url.to_string(),
            (None, None) => anyhow::bail!("source '{}' has no url", source.name),
        };

        units.push(Arc::new(http::HttpCollector::new(
            source.name.clone(),
            url,
            adapter,
            client.clone(),
        )));
    }

    Ok(units)
}
