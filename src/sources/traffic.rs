use serde_json::Value;

use super::adapter::{SourceAdapter, array_len};

/// Traffic incidents
///
/// Regional DOT feeds differ; two shapes are accepted:
/// - a top-level JSON array of incidents
/// - an object with an `incidents` array
///
/// No public default endpoint, the feed URL (usually carrying an
/// access code) must be configured.
pub struct TrafficAdapter;

impl SourceAdapter for TrafficAdapter {
    fn name(&self) -> &'static str {
        "traffic"
    }

    fn default_url(&self) -> Option<&'static str> {
        None
    }

    fn count_records(&self, payload: &Value) -> Option<u64> {
        match payload {
            Value::Array(items) => Some(items.len() as u64),
            _ => array_len(payload, "incidents"),
        }
    }
}
