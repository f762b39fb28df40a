use serde_json::Value;

use super::adapter::{SourceAdapter, array_len};

/// Weather observations (GeoJSON FeatureCollection)
///
/// api.weather.gov:
/// https://www.weather.gov/documentation/services-web-api
///
/// One feature per station observation.
pub struct WeatherAdapter;

impl SourceAdapter for WeatherAdapter {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn default_url(&self) -> Option<&'static str> {
        Some("https://api.weather.gov/stations/KSEA/observations?limit=12")
    }

    fn count_records(&self, payload: &Value) -> Option<u64> {
        array_len(payload, "features")
    }
}
