use async_trait::async_trait;
use tracing;

use crate::error::{NotifyError, Result};
use crate::NotificationSink;

/// SMS delivery through the HTTP gateway in front of the station's LTE
/// modem. Each recipient gets up to three attempts with doubling backoff;
/// delivery counts as successful if at least one recipient was reached.
pub struct SmsGatewayChannel {
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
    phone_numbers: Vec<String>,
}

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 100;

impl SmsGatewayChannel {
    pub fn new(gateway_url: &str, api_key: &str, phone_numbers: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url: gateway_url.to_string(),
            api_key: api_key.to_string(),
            phone_numbers,
        }
    }

    fn format_message(message: &str) -> String {
        format!("[vigia] {message}")
    }

    async fn send_one(&self, phone: &str, body: &str, alarm_id: i64) -> Result<()> {
        let payload = serde_json::json!({
            "to": phone,
            "message": body,
            "ref": alarm_id,
        });

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self
                .client
                .post(&self.gateway_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::warn!(
                        attempt = attempt + 1,
                        phone = %phone,
                        status,
                        "SMS gateway returned error, retrying"
                    );
                    last_err = Some(NotifyError::Gateway { status, body });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        phone = %phone,
                        error = %e,
                        "SMS send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt);
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| NotifyError::Other("no recipients".to_string())))
    }
}

#[async_trait]
impl NotificationSink for SmsGatewayChannel {
    async fn post(&self, alarm_id: i64, message: &str) -> Result<()> {
        let body = Self::format_message(message);

        let mut delivered = 0usize;
        let mut last_err = None;
        for phone in &self.phone_numbers {
            match self.send_one(phone, &body, alarm_id).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::error!(phone = %phone, error = %e, "SMS failed after retries");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }

    fn channel_name(&self) -> &str {
        "sms"
    }
}
