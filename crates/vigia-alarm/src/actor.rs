use std::sync::Arc;

use tokio::sync::mpsc;
use tracing;
use vigia_common::id::allocate_rule_id;
use vigia_common::types::Rule;
use vigia_store::RuleStore;

use crate::engine::Evaluator;

/// One rule-list edit intent.
#[derive(Debug, Clone)]
pub enum Mutation {
    Create(Rule),
    Remove(i64),
    SetEnabled { id: i64, enabled: bool },
}

/// Serializes rule edits into the store.
///
/// All intents funnel through an unbounded queue into a single consumer
/// task, each applied as one read-modify-write cycle, so two concurrent
/// edits never silently clobber each other. A failed write drops that one
/// intent (logged at warn) and the loop continues; the actor never
/// terminates because of a bad mutation.
#[derive(Clone)]
pub struct MutationActor {
    tx: mpsc::UnboundedSender<Mutation>,
}

impl MutationActor {
    /// Spawns the consumer task. The task drains the queue and exits once
    /// every submit handle is dropped; await the returned handle to flush
    /// pending edits before a one-shot process exits.
    pub fn spawn(
        store: Arc<RuleStore>,
        evaluator: Arc<Evaluator>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, store, evaluator));
        (Self { tx }, task)
    }

    /// Enqueues one intent. The consumer lives as long as any handle does,
    /// so a send only fails during shutdown, where dropping the intent is
    /// the right outcome.
    pub fn submit(&self, mutation: Mutation) {
        let _ = self.tx.send(mutation);
    }

    pub fn create(&self, rule: Rule) {
        self.submit(Mutation::Create(rule));
    }

    pub fn remove(&self, id: i64) {
        self.submit(Mutation::Remove(id));
    }

    pub fn set_enabled(&self, id: i64, enabled: bool) {
        self.submit(Mutation::SetEnabled { id, enabled });
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Mutation>,
    store: Arc<RuleStore>,
    evaluator: Arc<Evaluator>,
) {
    while let Some(mutation) = rx.recv().await {
        apply(&store, &evaluator, mutation).await;
    }
    tracing::debug!("mutation actor stopped");
}

/// Applies one intent: read the current list, compute the next one, write
/// it back, then run the post-write side effects before the next intent is
/// pulled.
async fn apply(store: &RuleStore, evaluator: &Evaluator, mutation: Mutation) {
    match mutation {
        Mutation::Create(mut rule) => {
            let mut rules = store.read();
            // The definitive id is allocated against the stored list so two
            // creates in the same millisecond stay distinct.
            rule.id = allocate_rule_id(rules.iter().map(|r| r.id));
            let id = rule.id;
            tracing::info!(rule_id = id, rule = %rule.describe(), "creating rule");
            rules.push(rule);
            if let Err(e) = store.write(&rules) {
                tracing::warn!(rule_id = id, error = %e, "create dropped: write failed");
                return;
            }
            // Ids are never reused, so this is normally a no-op.
            evaluator.clear_state(id).await;
            // A just-created rule that already satisfies its condition fires
            // promptly instead of waiting for the next tick.
            evaluator.run_cycle().await;
        }
        Mutation::Remove(id) => {
            let mut rules = store.read();
            let before = rules.len();
            rules.retain(|r| r.id != id);
            if rules.len() == before {
                tracing::debug!(rule_id = id, "remove: no such rule");
                return;
            }
            tracing::info!(rule_id = id, "removing rule");
            if let Err(e) = store.write(&rules) {
                tracing::warn!(rule_id = id, error = %e, "remove dropped: write failed");
                return;
            }
            evaluator.clear_state(id).await;
        }
        Mutation::SetEnabled { id, enabled } => {
            let mut rules = store.read();
            let Some(rule) = rules.iter_mut().find(|r| r.id == id) else {
                tracing::debug!(rule_id = id, "set-enabled: no such rule");
                return;
            };
            rule.enabled = enabled;
            tracing::info!(rule_id = id, enabled, "toggling rule");
            if let Err(e) = store.write(&rules) {
                tracing::warn!(rule_id = id, error = %e, "toggle dropped: write failed");
                return;
            }
            // Clearing on re-enable makes the rule eligible to fire again
            // even if the reading has not changed since it last fired.
            evaluator.clear_state(id).await;
            if enabled {
                evaluator.run_cycle().await;
            }
        }
    }
}
