use async_trait::async_trait;
use tracing;

use crate::error::Result;
use crate::NotificationSink;

/// Posts alarms to the log. Default sink when no gateway is configured,
/// which keeps headless bring-up observable without a modem.
#[derive(Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationSink for LogChannel {
    async fn post(&self, alarm_id: i64, message: &str) -> Result<()> {
        tracing::warn!(alarm_id, "{message}");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
