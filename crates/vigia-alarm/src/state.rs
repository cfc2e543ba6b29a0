use tokio::time::{Duration, Instant};

/// Per-rule evaluation memory. Process-local, never persisted: after a
/// restart every armed rule is again eligible to fire.
///
/// Created lazily on a rule's first evaluation; cleared when the rule is
/// removed or re-armed; otherwise lives for the process lifetime, shared by
/// whichever execution context evaluates next.
#[derive(Debug, Clone, Default)]
pub struct EvalState {
    /// The rule has fired and its condition has not released since.
    pub triggered: bool,
    /// Source timestamp of the reading that caused the last firing. Guards
    /// against re-firing on a stale, unchanged sample.
    pub last_fired_ts: Option<String>,
    /// Monotonic instant of the last firing, for the cooldown floor.
    pub last_fire_at: Option<Instant>,
}

impl EvalState {
    /// True iff the metric's current timestamp is present and differs from
    /// the one that caused the last firing.
    pub fn ts_changed(&self, ts: Option<&str>) -> bool {
        match ts {
            Some(ts) => self.last_fired_ts.as_deref() != Some(ts),
            None => false,
        }
    }

    /// True once at least `cooldown` has elapsed since the last firing.
    pub fn cooldown_over(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_fire_at {
            Some(at) => now.duration_since(at) >= cooldown,
            None => true,
        }
    }

    /// Records a firing caused by the reading at `ts`.
    pub fn fired(&mut self, ts: &str, now: Instant) {
        self.triggered = true;
        self.last_fired_ts = Some(ts.to_string());
        self.last_fire_at = Some(now);
    }

    /// The condition released: the rule may fire again later. Keeps the
    /// timestamp and cooldown bookkeeping.
    pub fn reset(&mut self) {
        self.triggered = false;
    }
}
