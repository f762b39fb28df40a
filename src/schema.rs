use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal outcome of one source within a collection run.
///
/// This enum replaces a bare "absent" value so downstream consumers can
/// tell apart:
/// - a source that produced a value (possibly zero records)
/// - a source that could not be retrieved
/// - a source whose retry loop was cut short by cancellation / deadline
///
/// The `status` field is added by serde and is used by the storage side
/// for routing (e.g. "collected", "failed", "cancelled").
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome<T> {
    /// The unit succeeded; no further attempts were made.
    Collected { value: T, attempts: u32 },

    /// Every attempt failed, or the failure escaped the retry loop.
    ///
    /// `attempts` is 0 for escaped failures: the executor never got to
    /// report how far it came.
    Failed { reason: String, attempts: u32 },

    /// The cancellation signal fired before the unit settled.
    Cancelled { attempts: u32 },
}

impl<T> SourceOutcome<T> {
    /// The collected value, if any. `None` is the "absent" field.
    pub fn value(&self) -> Option<&T> {
        match self {
            SourceOutcome::Collected { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            SourceOutcome::Collected { attempts, .. }
            | SourceOutcome::Failed { attempts, .. }
            | SourceOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_collected(&self) -> bool {
        matches!(self, SourceOutcome::Collected { .. })
    }

    /// Free-text description used for the result's error list.
    ///
    /// Returns `None` for collected sources.
    pub fn error_text(&self) -> Option<String> {
        match self {
            SourceOutcome::Collected { .. } => None,
            SourceOutcome::Failed { reason, .. } => Some(reason.clone()),
            SourceOutcome::Cancelled { .. } => Some("cancelled".to_string()),
        }
    }
}

// ------------------------------------------------------------
// Per-source report
// ------------------------------------------------------------
//
// One entry per unit handed to the orchestrator, in input order.
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport<T> {
    /// Source name as supplied by the caller (e.g. "weather")
    pub name: String,

    #[serde(flatten)]
    pub outcome: SourceOutcome<T>,
}

// ------------------------------------------------------------
// Collection result (one per orchestrator run)
// ------------------------------------------------------------
//
// INVARIANTS:
// - `timestamp` is captured once, before any source starts.
// - A source has no value iff its outcome is not `Collected`.
// - Every non-collected source contributes exactly one entry to
//   `errors`, formatted "<name>: <message>", in source order.
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResult<T = u64> {
    /// Capture time of the run (UTC)
    pub timestamp: DateTime<Utc>,

    /// Per-source outcomes in input order
    pub sources: Vec<SourceReport<T>>,

    /// Diagnostic text, one line per non-collected source
    pub errors: Vec<String>,
}

impl<T> CollectionResult<T> {
    /// Looks up a source by name. Duplicate names resolve to the first entry.
    pub fn get(&self, name: &str) -> Option<&SourceOutcome<T>> {
        self.sources
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.outcome)
    }

    /// The value for `name`, `None` when absent or unknown.
    pub fn value(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(SourceOutcome::value)
    }

    pub fn collected_count(&self) -> usize {
        self.sources.iter().filter(|r| r.outcome.is_collected()).count()
    }

    /// True when every source produced a value.
    pub fn is_complete(&self) -> bool {
        self.collected_count() == self.sources.len()
    }
}
