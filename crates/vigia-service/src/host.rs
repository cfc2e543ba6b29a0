use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::time::Duration;
use tracing;
use vigia_alarm::engine::Evaluator;
use vigia_alarm::lifecycle::BackgroundHost;
use vigia_alarm::ticker::AlignedTicker;

/// Background execution host backed by a tokio task.
///
/// `start` spawns the tick-evaluate loop, `stop` signals it to wind down;
/// both are idempotent. Stopping never interrupts a cycle midway: the loop
/// checks the signal between ticks, so an in-flight fetch completes or fails
/// normally.
pub struct EvalLoopHost {
    evaluator: Arc<Evaluator>,
    period: Duration,
    phase_offset: Duration,
    shutdown: Mutex<Option<watch::Sender<()>>>,
}

impl EvalLoopHost {
    pub fn new(evaluator: Arc<Evaluator>, period: Duration, phase_offset: Duration) -> Self {
        Self {
            evaluator,
            period,
            phase_offset,
            shutdown: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BackgroundHost for EvalLoopHost {
    async fn start(&self) {
        let mut shutdown = self.shutdown.lock().await;
        if shutdown.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(());
        *shutdown = Some(tx);

        let evaluator = self.evaluator.clone();
        let period = self.period;
        let phase_offset = self.phase_offset;
        tokio::spawn(async move {
            let mut ticker = AlignedTicker::new(period, phase_offset);
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        evaluator.run_cycle().await;
                    }
                }
            }
            tracing::debug!("evaluation loop wound down");
        });
        tracing::info!(
            period_secs = period.as_secs(),
            "background evaluation loop started"
        );
    }

    async fn stop(&self) {
        if self.shutdown.lock().await.take().is_some() {
            tracing::info!("background evaluation loop stopped");
        }
    }
}
