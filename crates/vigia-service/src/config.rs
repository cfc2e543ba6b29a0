use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_rules_path")]
    pub rules_path: String,
    #[serde(default)]
    pub source: SourceConfig,
    /// SMS delivery; alarms go to the log when absent.
    #[serde(default)]
    pub sms: Option<SmsConfig>,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_influx_url")]
    pub influx_url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SmsConfig {
    pub gateway_url: String,
    pub api_key: String,
    pub phone_numbers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// Offset of the tick grid from the epoch; 5 puts ticks on seconds
    /// ending in 5 with the default period.
    #[serde(default = "default_phase_offset_secs")]
    pub phase_offset_secs: u64,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_rules_path() -> String {
    "data/rules.json".to_string()
}

fn default_influx_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_database() -> String {
    "weather_data".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_period_secs() -> u64 {
    10
}

fn default_phase_offset_secs() -> u64 {
    5
}

fn default_window_secs() -> u64 {
    300
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            influx_url: default_influx_url(),
            database: default_database(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            phase_offset_secs: default_phase_offset_secs(),
            window_secs: default_window_secs(),
            cooldown_secs: default_cooldown_secs(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rules_path: default_rules_path(),
            source: SourceConfig::default(),
            sms: None,
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.rules_path, "data/rules.json");
        assert_eq!(config.source.influx_url, "http://localhost:8086");
        assert_eq!(config.source.database, "weather_data");
        assert_eq!(config.evaluation.period_secs, 10);
        assert_eq!(config.evaluation.phase_offset_secs, 5);
        assert_eq!(config.evaluation.debounce_ms, 300);
        assert!(config.sms.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config: ServiceConfig = toml::from_str(
            r#"
            rules_path = "/var/lib/vigia/rules.json"

            [source]
            influx_url = "http://192.168.1.1:8086"
            database = "weather_data"
            timeout_secs = 5

            [sms]
            gateway_url = "http://192.168.8.1:9090/sms"
            api_key = "secret"
            phone_numbers = ["+573001112233"]

            [evaluation]
            period_secs = 30
            cooldown_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.rules_path, "/var/lib/vigia/rules.json");
        assert_eq!(config.source.timeout_secs, 5);
        assert_eq!(config.evaluation.period_secs, 30);
        assert_eq!(config.evaluation.cooldown_secs, 60);
        // Unset fields inside a present section still default.
        assert_eq!(config.evaluation.window_secs, 300);
        let sms = config.sms.unwrap();
        assert_eq!(sms.phone_numbers.len(), 1);
    }
}
