//! Durable rule store: a JSON list of rule records on disk plus a change
//! feed that publishes one snapshot per successful write.
//!
//! The store is the sole owner of the authoritative list; every other
//! component holds only transient copies. Reads are fail-safe (any error
//! yields an empty list), writes are atomic (temp file + rename) so a crash
//! mid-write never corrupts the armed rules that keep the background service
//! alive across restarts.

pub mod error;


use std::path::{Path, PathBuf};

use tokio::sync::watch;
use vigia_common::types::Rule;

use crate::error::Result;

pub struct RuleStore {
    path: PathBuf,
    feed: watch::Sender<Vec<Rule>>,
}

impl RuleStore {
    /// Opens the store at `path`, seeding the change feed with the current
    /// list. A missing or unreadable file starts as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (feed, _) = watch::channel(load_or_empty(&path));
        Self { path, feed }
    }

    /// The current rule list. Never fails: corruption or I/O trouble is
    /// logged and collapses to an empty list.
    pub fn read(&self) -> Vec<Rule> {
        load_or_empty(&self.path)
    }

    /// Replaces the stored list and publishes the new snapshot on the
    /// change feed. The feed only advances on a successful write.
    pub fn write(&self, rules: &[Rule]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(rules)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        self.feed.send_replace(rules.to_vec());
        Ok(())
    }

    /// Subscribes to list snapshots. The receiver always observes the latest
    /// snapshot (intermediate writes may be coalesced) and can be re-created
    /// at any time.
    pub fn changes(&self) -> watch::Receiver<Vec<Rule>> {
        self.feed.subscribe()
    }
}

fn load_or_empty(path: &Path) -> Vec<Rule> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "rule list unreadable, treating as empty");
            return Vec::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "rule list corrupt, treating as empty");
            Vec::new()
        }
    }
}
