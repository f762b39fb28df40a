use serde_json::Value;

use super::adapter::SourceAdapter;

/// River gauges (USGS Instantaneous Values service)
///
/// https://waterservices.usgs.gov/docs/instantaneous-values/
///
/// Payload: `value.timeSeries[]`, each with `values[].value[]`.
/// A series is counted only if it carries at least one reading.
pub struct GaugesAdapter;

impl SourceAdapter for GaugesAdapter {
    fn name(&self) -> &'static str {
        "gauges"
    }

    fn default_url(&self) -> Option<&'static str> {
        Some("https://waterservices.usgs.gov/nwis/iv/?format=json&stateCd=wa&parameterCd=00065&siteStatus=active")
    }

    fn count_records(&self, payload: &Value) -> Option<u64> {
        let series = payload.pointer("/value/timeSeries")?.as_array()?;

        let with_readings = series
            .iter()
            .filter(|s| {
                s.get("values")
                    .and_then(Value::as_array)
                    .is_some_and(|blocks| {
                        blocks.iter().any(|b| {
                            b.get("value")
                                .and_then(Value::as_array)
                                .is_some_and(|v| !v.is_empty())
                        })
                    })
            })
            .count();

        Some(with_readings as u64)
    }
}
