use serde_json::Value;

/// SourceAdapter is the mapping layer between:
/// - The generic HTTP collector
/// - One external feed's JSON payload shape
///
/// Each adapter must:
/// - Name the feed kind it understands
/// - Optionally provide a default endpoint
/// - Turn a decoded payload into a record count
///
/// MUST NOT:
/// - Perform network I/O
/// - Hold mutable state
///
/// THREAD SAFETY:
/// - Must be Send + Sync, one instance is shared by every attempt
///
pub trait SourceAdapter: Send + Sync {
    /// Kind identifier, matches `sources[].kind` in configuration.
    fn name(&self) -> &'static str;

    /// Endpoint used when the configuration does not provide `url`.
    ///
    /// `None` means the feed has no public default and a `url` is required.
    fn default_url(&self) -> Option<&'static str>;

    /// Counts the records in a decoded payload.
    ///
    /// RETURNS:
    /// - `Some(n)` for a payload of the expected shape (n may be 0)
    /// - `None` when the shape is unrecognised; the caller treats this
    ///   as a failed attempt and retries
    ///
    fn count_records(&self, payload: &Value) -> Option<u64>;
}

/// Length of the array at `key`, if present.
pub(crate) fn array_len(payload: &Value, key: &str) -> Option<u64> {
    payload.get(key)?.as_array().map(|a| a.len() as u64)
}
