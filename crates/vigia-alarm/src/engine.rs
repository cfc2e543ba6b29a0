use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing;
use vigia_common::types::{tenths_to_f64, to_tenths, Rule, Tenths};
use vigia_notify::NotificationSink;
use vigia_store::RuleStore;

use crate::state::EvalState;
use crate::MetricSource;

/// Hysteresis slack in tenths: the raw condition is relaxed by ±0.1 around
/// the threshold so sub-decimal sensor noise cannot flap an alarm.
const HYSTERESIS_SLACK: Tenths = 1;

/// Default recency window handed to the metric source.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(300);

/// Default monotonic floor between successive firings of one rule. A
/// defensive lower bound independent of the source timestamp granularity.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Evaluates armed rules against the latest metric snapshot and fires
/// notifications with at-most-once-per-transition semantics.
///
/// One `Evaluator` is shared by every execution context (foreground ticker,
/// background service, forced cycles from the mutation actor). A single
/// internal lock serializes whole cycles: a tick arriving while another
/// cycle is in flight waits rather than overlapping or being dropped.
pub struct Evaluator {
    store: Arc<RuleStore>,
    source: Arc<dyn MetricSource>,
    sink: Arc<dyn NotificationSink>,
    window: Duration,
    cooldown: Duration,
    states: Mutex<HashMap<i64, EvalState>>,
}

impl Evaluator {
    pub fn new(
        store: Arc<RuleStore>,
        source: Arc<dyn MetricSource>,
        sink: Arc<dyn NotificationSink>,
        window: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            source,
            sink,
            window,
            cooldown,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Forgets the evaluation memory of one rule. Called by the mutation
    /// actor when a rule is created, removed, or toggled, so a re-armed rule
    /// is eligible to fire even on an unchanged reading.
    pub async fn clear_state(&self, rule_id: i64) {
        self.states.lock().await.remove(&rule_id);
    }

    /// Runs one evaluation cycle.
    ///
    /// Never returns an error: a failed fetch skips the cycle, and per-rule
    /// delivery or persistence trouble is logged without touching the other
    /// rules of the same cycle.
    pub async fn run_cycle(&self) {
        let mut states = self.states.lock().await;

        let rules: Vec<Rule> = self
            .store
            .read()
            .into_iter()
            .filter(|r| r.enabled)
            .collect();
        if rules.is_empty() {
            return;
        }

        let snapshot = match self.source.fetch_latest(self.window).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "metric fetch failed, skipping evaluation cycle");
                return;
            }
        };

        let now = Instant::now();
        for rule in &rules {
            // All rules of one cycle see the same snapshot.
            self.evaluate_rule(rule, &snapshot, now, &mut states).await;
        }
    }

    async fn evaluate_rule(
        &self,
        rule: &Rule,
        snapshot: &crate::MetricSnapshot,
        now: Instant,
        states: &mut HashMap<i64, EvalState>,
    ) {
        let Some(reading) = snapshot.reading(rule.metric) else {
            return;
        };
        let Some(value) = reading.value else {
            // No sample in the window: leave the rule's state untouched.
            return;
        };

        let value_t = to_tenths(value);
        let raw = rule
            .operator
            .holds(value_t, rule.threshold_tenths(), HYSTERESIS_SLACK);

        let state = states.entry(rule.id).or_default();
        let ts = reading.timestamp_utc.as_deref();

        if raw && !state.triggered {
            if !state.ts_changed(ts) {
                tracing::debug!(rule_id = rule.id, "alarm suppressed: reading timestamp unchanged");
                return;
            }
            if !state.cooldown_over(now, self.cooldown) {
                tracing::debug!(rule_id = rule.id, "alarm suppressed: cooldown active");
                return;
            }
            // ts_changed was true, so the timestamp is present.
            let ts = ts.unwrap_or_default();

            // Record before delivering: if the post fails, the rule does not
            // retry on the same reading.
            state.fired(ts, now);

            let message = alarm_message(rule, value_t, ts);
            tracing::info!(
                rule_id = rule.id,
                metric = %rule.metric,
                value = tenths_to_f64(value_t),
                threshold = rule.threshold,
                "alarm fired"
            );
            if let Err(e) = self.sink.post(rule.id, &message).await {
                tracing::warn!(rule_id = rule.id, error = %e, "alarm notification failed");
            }

            self.disarm(rule.id);
        } else if !raw && state.triggered {
            state.reset();
        }
    }

    /// Persists `enabled = false` for a rule that just fired. Goes straight
    /// to the store, not through the mutation actor, and must not clear the
    /// evaluation state that was set on firing.
    fn disarm(&self, rule_id: i64) {
        let mut rules = self.store.read();
        let mut found = false;
        for rule in &mut rules {
            if rule.id == rule_id {
                rule.enabled = false;
                found = true;
            }
        }
        if !found {
            // Removed concurrently by a user edit; nothing to persist.
            return;
        }
        if let Err(e) = self.store.write(&rules) {
            // The in-memory disarm still prevents re-firing this process
            // lifetime even though the on-disk flag did not land.
            tracing::warn!(rule_id, error = %e, "could not persist disarm");
        }
    }
}

fn alarm_message(rule: &Rule, value_t: Tenths, ts: &str) -> String {
    let unit = rule.metric.unit();
    let suffix = if unit.is_empty() {
        String::new()
    } else {
        format!(" {unit}")
    };
    format!(
        "{}: value {:.1}{} at {}",
        rule.describe(),
        tenths_to_f64(value_t),
        suffix,
        ts
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigia_common::types::{CompareOp, Metric};

    #[test]
    fn message_names_the_firing_metric_and_its_timestamp() {
        let rule = Rule {
            id: 1,
            metric: Metric::WindSpeed,
            operator: CompareOp::GreaterEqual,
            threshold: 40.0,
            enabled: true,
        };
        let msg = alarm_message(&rule, to_tenths(41.3), "2026-03-01T10:00:05Z");
        assert_eq!(
            msg,
            "wind speed at or above 40.0 km/h: value 41.3 km/h at 2026-03-01T10:00:05Z"
        );
    }

    #[test]
    fn dimensionless_metric_gets_no_unit_suffix() {
        let rule = Rule {
            id: 1,
            metric: Metric::FIndex,
            operator: CompareOp::GreaterEqual,
            threshold: 1.5,
            enabled: true,
        };
        let msg = alarm_message(&rule, to_tenths(1.62), "2026-03-01T10:00:05Z");
        assert_eq!(msg, "F-index at or above 1.5: value 1.6 at 2026-03-01T10:00:05Z");
    }
}
