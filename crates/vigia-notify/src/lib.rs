//! Notification delivery for fired alarms.
//!
//! The evaluation engine posts through the [`NotificationSink`] trait and
//! never blocks on delivery semantics: errors are logged and the cycle moves
//! on. Built-in channels are an SMS gateway (HTTP, in front of the station's
//! LTE modem) and a log channel for headless bring-up.

pub mod channels;
pub mod error;

use async_trait::async_trait;

use crate::error::Result;

/// A delivery channel for fired alarms.
///
/// `alarm_id` is the stable per-rule identifier; receivers may use it to
/// visually coalesce duplicates within a short window. The engine's own
/// disarm-on-fire already bounds how often one rule can post.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one alarm message.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after the channel's own retries.
    async fn post(&self, alarm_id: i64, message: &str) -> Result<()>;

    /// Returns the channel type name (e.g., `"sms"`, `"log"`).
    fn channel_name(&self) -> &str;
}
