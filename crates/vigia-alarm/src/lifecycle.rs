use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing;
use vigia_common::types::Rule;

/// The platform facility that keeps the evaluation loop alive in the
/// background (and restarts it after reboot). Both calls are idempotent.
#[async_trait]
pub trait BackgroundHost: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
}

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Decides from the rule list whether the background loop should run, and
/// applies that decision to the host, debounced: a burst of edits
/// (toggling a rule twice quickly) collapses into at most one start-or-stop
/// call reflecting the final desired state.
pub struct LifecyclePolicy {
    host: Arc<dyn BackgroundHost>,
    debounce: Duration,
    /// The decision already applied to the host, if any. Seeded by the
    /// boot/resume hook so startup does not issue a redundant call.
    applied: Option<bool>,
}

impl LifecyclePolicy {
    pub fn new(host: Arc<dyn BackgroundHost>, debounce: Duration, applied: Option<bool>) -> Self {
        Self {
            host,
            debounce,
            applied,
        }
    }

    /// Spawns the policy over a rule-list change feed. The task ends when
    /// the feed closes (store dropped); cancellation mid-debounce applies
    /// nothing.
    pub fn spawn(self, changes: watch::Receiver<Vec<Rule>>) -> JoinHandle<()> {
        tokio::spawn(self.run(changes))
    }

    pub async fn run(mut self, mut changes: watch::Receiver<Vec<Rule>>) {
        loop {
            if changes.changed().await.is_err() {
                return;
            }
            let mut wanted = any_enabled(&changes.borrow_and_update());
            if Some(wanted) == self.applied {
                continue;
            }

            // Cancel-and-reschedule: every further change restarts the timer
            // and refreshes the desired state; the decision applied is the
            // one in force when the timer finally expires.
            'debounce: loop {
                let timer = tokio::time::sleep(self.debounce);
                tokio::pin!(timer);
                tokio::select! {
                    _ = &mut timer => break 'debounce,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        wanted = any_enabled(&changes.borrow_and_update());
                    }
                }
            }

            if Some(wanted) != self.applied {
                if wanted {
                    tracing::info!("armed rules present, starting background evaluation");
                    self.host.start().await;
                } else {
                    tracing::info!("no armed rules, stopping background evaluation");
                    self.host.stop().await;
                }
                self.applied = Some(wanted);
            }
        }
    }
}

fn any_enabled(rules: &[Rule]) -> bool {
    rules.iter().any(|r| r.enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use vigia_common::types::{CompareOp, Metric};

    #[derive(Default)]
    struct RecordingHost {
        calls: StdMutex<Vec<bool>>,
    }

    #[async_trait]
    impl BackgroundHost for RecordingHost {
        async fn start(&self) {
            self.calls.lock().unwrap().push(true);
        }

        async fn stop(&self) {
            self.calls.lock().unwrap().push(false);
        }
    }

    fn rule(enabled: bool) -> Rule {
        Rule {
            id: 1,
            metric: Metric::FIndex,
            operator: CompareOp::GreaterEqual,
            threshold: 1.5,
            enabled,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_toggles_applies_only_the_final_state() {
        let host = Arc::new(RecordingHost::default());
        let (tx, rx) = watch::channel(Vec::new());
        let policy = LifecyclePolicy::new(host.clone(), DEFAULT_DEBOUNCE, None);
        let task = policy.spawn(rx);

        // Three rapid toggles well inside the debounce window.
        tx.send(vec![rule(true)]).unwrap();
        tx.send(vec![rule(false)]).unwrap();
        tx.send(vec![rule(true)]).unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*host.calls.lock().unwrap(), vec![true]);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn settling_back_to_the_applied_state_calls_nothing() {
        let host = Arc::new(RecordingHost::default());
        let (tx, rx) = watch::channel(Vec::new());
        // The boot hook already started the host.
        let policy = LifecyclePolicy::new(host.clone(), DEFAULT_DEBOUNCE, Some(true));
        let task = policy.spawn(rx);

        tx.send(vec![rule(false)]).unwrap();
        tx.send(vec![rule(true)]).unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(host.calls.lock().unwrap().is_empty());

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_follows_once_the_last_rule_disarms() {
        let host = Arc::new(RecordingHost::default());
        let (tx, rx) = watch::channel(vec![rule(true)]);
        let policy = LifecyclePolicy::new(host.clone(), DEFAULT_DEBOUNCE, Some(true));
        let task = policy.spawn(rx);

        tx.send(vec![rule(false)]).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*host.calls.lock().unwrap(), vec![false]);

        drop(tx);
        task.await.unwrap();
    }
}
