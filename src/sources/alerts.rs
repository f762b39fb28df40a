use serde_json::Value;

use super::adapter::SourceAdapter;

/// Active weather alerts (GeoJSON FeatureCollection)
///
/// api.weather.gov /alerts/active
///
/// Only alerts with `status == "Actual"` are counted; "Test",
/// "Exercise" and "System" messages are ignored. Features without a
/// status are counted.
pub struct AlertsAdapter;

impl SourceAdapter for AlertsAdapter {
    fn name(&self) -> &'static str {
        "alerts"
    }

    fn default_url(&self) -> Option<&'static str> {
        Some("https://api.weather.gov/alerts/active?area=WA")
    }

    fn count_records(&self, payload: &Value) -> Option<u64> {
        let features = payload.get("features")?.as_array()?;

        let actual = features
            .iter()
            .filter(|f| {
                f.pointer("/properties/status")
                    .and_then(Value::as_str)
                    .is_none_or(|s| s == "Actual")
            })
            .count();

        Some(actual as u64)
    }
}
