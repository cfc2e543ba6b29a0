//! Alarm management and evaluation engine.
//!
//! The engine watches user-defined threshold rules over the station's four
//! metrics. Each evaluation cycle reads the armed rules, polls the metric
//! source once, and fires at most one notification per qualifying
//! transition, then disarms the rule. Rule edits flow through a serialized
//! mutation actor so concurrent edits never clobber each other, and a
//! debounced lifecycle policy starts or stops the background loop based on
//! whether any rule is armed.

pub mod actor;
pub mod engine;
pub mod lifecycle;
pub mod state;
pub mod ticker;


use std::collections::HashMap;

use async_trait::async_trait;
use tokio::time::Duration;
use vigia_common::types::Metric;

/// Latest reading of one metric within the recency window. Both fields are
/// empty when the window held no sample.
#[derive(Debug, Clone, Default)]
pub struct Reading {
    pub value: Option<f64>,
    /// Source timestamp of the sample (station format, second-precision
    /// ISO-8601 `Z`). Opaque to the engine: compared only for equality.
    pub timestamp_utc: Option<String>,
}

/// Result of one metric-source poll. Ephemeral; never persisted.
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    pub readings: HashMap<Metric, Reading>,
}

impl MetricSnapshot {
    pub fn reading(&self, metric: Metric) -> Option<&Reading> {
        self.readings.get(&metric)
    }
}

/// Errors from the metric source. All transient from the engine's point of
/// view: a failed fetch skips the current cycle and touches no state.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("metric source: transport error: {0}")]
    Transport(String),

    #[error("metric source: request timed out")]
    Timeout,

    #[error("metric source: unexpected response: {0}")]
    Decode(String),
}

/// Supplier of the latest metric values.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Returns the latest value and UTC timestamp for each tracked metric,
    /// looking back `window` from now.
    async fn fetch_latest(&self, window: Duration) -> Result<MetricSnapshot, FetchError>;
}
