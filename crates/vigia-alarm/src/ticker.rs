use chrono::Utc;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

/// Periodic tick source phase-locked to wall-clock boundaries.
///
/// Ticks land on the grid `k * period + phase_offset` from the epoch rather
/// than on multiples of the construction time, so independent instances
/// (foreground loop, background service) tick in near-lockstep and log lines
/// align with readable clock marks. With the defaults (10 s period, 5 s
/// offset) ticks land on seconds ending in 5.
///
/// Dropping the ticker cancels it with no further side effects. Ticks that
/// would pile up behind a slow cycle are skipped, not bursted.
pub struct AlignedTicker {
    interval: Interval,
}

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);
pub const DEFAULT_PHASE_OFFSET: Duration = Duration::from_secs(5);

impl AlignedTicker {
    pub fn new(period: Duration, phase_offset: Duration) -> Self {
        let delay = delay_until_aligned(
            Utc::now().timestamp_millis(),
            period.as_millis() as i64,
            phase_offset.as_millis() as i64,
        );
        let mut interval = interval_at(Instant::now() + delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    /// Completes at the next aligned boundary.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Wait until the smallest `k * period + phase >= now`, all in milliseconds
/// from the epoch. Zero when `now` already sits on the grid.
fn delay_until_aligned(now_ms: i64, period_ms: i64, phase_ms: i64) -> Duration {
    let rem = (now_ms - phase_ms).rem_euclid(period_ms);
    let wait = if rem == 0 { 0 } else { period_ms - rem };
    Duration::from_millis(wait as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_to_the_next_grid_point() {
        // Grid :05, :15, :25... now = :12 -> 3 s to :15.
        assert_eq!(
            delay_until_aligned(12_000, 10_000, 5_000),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn on_grid_means_no_wait() {
        assert_eq!(delay_until_aligned(15_000, 10_000, 5_000), Duration::ZERO);
    }

    #[test]
    fn just_before_the_grid_waits_the_remainder() {
        assert_eq!(
            delay_until_aligned(4_999, 10_000, 5_000),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn zero_phase_aligns_to_period_multiples() {
        assert_eq!(
            delay_until_aligned(10_500, 10_000, 0),
            Duration::from_millis(9_500)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_the_configured_cadence() {
        let mut ticker = AlignedTicker::new(Duration::from_secs(10), Duration::from_secs(5));
        // First tick lands on the grid, later ticks follow the period.
        ticker.tick().await;
        let before = Instant::now();
        ticker.tick().await;
        assert_eq!(before.elapsed(), Duration::from_secs(10));
    }
}
