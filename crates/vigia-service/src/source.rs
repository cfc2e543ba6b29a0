use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Duration;
use vigia_alarm::{FetchError, MetricSnapshot, MetricSource, Reading};
use vigia_common::types::Metric;

/// Metric source backed by the station's InfluxDB 1.x HTTP endpoint.
///
/// One `SELECT last(...)` per metric over the recency window, against the
/// measurements the gateway writes: `f_index` (computed index),
/// `sensor_data` (temperature/humidity from the DHT22) and `wind_data`
/// (anemometer, stored in m/s and converted to km/h here).
pub struct InfluxMetricSource {
    client: reqwest::Client,
    base_url: String,
    database: String,
}

impl InfluxMetricSource {
    pub fn new(base_url: &str, database: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.to_string(),
        })
    }

    async fn query_latest(&self, metric: Metric, window_secs: u64) -> Result<Reading, FetchError> {
        let query = select_last(metric, window_secs);
        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[("db", self.database.as_str()), ("q", query.as_str())])
            .send()
            .await
            .map_err(to_fetch_error)?;

        if !response.status().is_success() {
            return Err(FetchError::Transport(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: QueryResponse = response.json().await.map_err(to_fetch_error)?;
        Ok(reading_from_response(&body, metric))
    }
}

#[async_trait]
impl MetricSource for InfluxMetricSource {
    async fn fetch_latest(&self, window: Duration) -> Result<MetricSnapshot, FetchError> {
        let window_secs = window.as_secs().max(1);
        let mut snapshot = MetricSnapshot::default();
        for metric in Metric::ALL {
            let reading = self.query_latest(metric, window_secs).await?;
            snapshot.readings.insert(metric, reading);
        }
        Ok(snapshot)
    }
}

fn to_fetch_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_decode() {
        FetchError::Decode(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}

fn select_last(metric: Metric, window_secs: u64) -> String {
    let (field, measurement) = match metric {
        Metric::FIndex => ("F_index", "f_index"),
        Metric::Temperature => ("temperature", "sensor_data"),
        Metric::Humidity => ("humidity", "sensor_data"),
        Metric::WindSpeed => ("wind_speed", "wind_data"),
    };
    format!("SELECT last(\"{field}\") FROM \"{measurement}\" WHERE time > now() - {window_secs}s")
}

// ---- InfluxDB 1.x /query response shape ----

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    series: Vec<Series>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Extracts the `[time, last]` row. A window with no sample comes back with
/// no series at all, which maps to an empty reading rather than an error.
fn reading_from_response(body: &QueryResponse, metric: Metric) -> Reading {
    let Some(row) = body
        .results
        .first()
        .and_then(|r| r.series.first())
        .and_then(|s| s.values.first())
    else {
        return Reading::default();
    };

    let timestamp_utc = row.first().and_then(|v| v.as_str()).map(str::to_string);
    let mut value = row.get(1).and_then(|v| v.as_f64());
    if metric == Metric::WindSpeed {
        // The anemometer worker stores m/s.
        value = value.map(|v| v * 3.6);
    }
    Reading {
        value,
        timestamp_utc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> QueryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn extracts_last_value_and_timestamp() {
        let body = parse(
            r#"{"results":[{"statement_id":0,"series":[{"name":"f_index","columns":["time","last"],"values":[["2026-03-01T10:00:05Z",1.62]]}]}]}"#,
        );
        let reading = reading_from_response(&body, Metric::FIndex);
        assert_eq!(reading.value, Some(1.62));
        assert_eq!(reading.timestamp_utc.as_deref(), Some("2026-03-01T10:00:05Z"));
    }

    #[test]
    fn empty_window_yields_an_empty_reading() {
        let body = parse(r#"{"results":[{"statement_id":0}]}"#);
        let reading = reading_from_response(&body, Metric::Temperature);
        assert!(reading.value.is_none());
        assert!(reading.timestamp_utc.is_none());
    }

    #[test]
    fn wind_speed_converts_to_kmh() {
        let body = parse(
            r#"{"results":[{"series":[{"values":[["2026-03-01T10:00:05Z",10.0]]}]}]}"#,
        );
        let reading = reading_from_response(&body, Metric::WindSpeed);
        assert_eq!(reading.value, Some(36.0));
    }

    #[test]
    fn queries_scope_to_the_recency_window() {
        let q = select_last(Metric::Humidity, 300);
        assert_eq!(
            q,
            "SELECT last(\"humidity\") FROM \"sensor_data\" WHERE time > now() - 300s"
        );
    }
}
