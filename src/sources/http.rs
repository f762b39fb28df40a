use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;

use super::adapter::SourceAdapter;
use crate::{collector::CollectorUnit, config::HttpConfig};

/// Builds the shared HTTP client from configuration.
pub fn build_client(cfg: &HttpConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(cfg.timeout_ms))
        .user_agent(cfg.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Fetch-and-map unit: GET a JSON document, count records via an adapter.
///
/// Every failure (transport, non-2xx status, undecodable body,
/// unexpected shape) is returned as an error so the executor retries it.
///
/// Error text never carries the query string: feed URLs may embed
/// access codes, and errors end up in the published snapshot.
pub struct HttpCollector {
    name: String,
    url: String,
    display_url: String,
    adapter: Arc<dyn SourceAdapter>,
    client: reqwest::Client,
}

impl HttpCollector {
    pub fn new(
        name: String,
        url: String,
        adapter: Arc<dyn SourceAdapter>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name,
            display_url: redact_query(&url),
            url,
            adapter,
            client,
        }
    }
}

#[async_trait::async_trait]
impl CollectorUnit for HttpCollector {
    type Output = u64;

    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> anyhow::Result<u64> {
        let payload: Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("GET {}", self.display_url))?
            .error_for_status()
            .map_err(reqwest::Error::without_url)?
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("invalid JSON body")?;

        self.adapter
            .count_records(&payload)
            .ok_or_else(|| anyhow::anyhow!("unexpected {} payload shape", self.adapter.name()))
    }
}

/// `https://host/path?code=abc` -> `https://host/path?<redacted>`
fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}
