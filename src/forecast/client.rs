//! Forecast Client (C3): fetches hourly temperature timeseries for a
//! `(lat, lon, start_utc, hours)` window, tolerant of two response shapes.

use crate::errors::{EngineError, EngineResult};
use crate::forecast::{Forecast, TemperaturePoint};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ForecastBody {
    /// `[{time, temp_K}, ...]`
    Points(Vec<RawPoint>),
    /// `{times: [...], values: [...]}`
    Parallel { times: Vec<DateTime<Utc>>, values: Vec<f64> },
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    time: DateTime<Utc>,
    #[serde(rename = "temp_K")]
    temp_k: f64,
}

pub struct ForecastClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl ForecastClient {
    pub fn new(base_url: &str, api_key: &str, max_retries: u32, per_call_timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(per_call_timeout).build().unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries,
        }
    }

    pub async fn fetch(
        &self,
        station_code: &str,
        event_day: NaiveDate,
        latitude: f64,
        longitude: f64,
        start_utc: DateTime<Utc>,
        hours: u32,
    ) -> EngineResult<Forecast> {
        let url = format!(
            "{}/forecast?latitude={latitude}&longitude={longitude}&variable=2m_temperature&start_time={}&predict_hours={hours}",
            self.base_url,
            start_utc.to_rfc3339(),
        );

        let body = self.get_with_retry(&url).await?;
        let fetched_at_utc = Utc::now();

        let points = match body {
            ForecastBody::Points(raw) => raw
                .into_iter()
                .map(|p| TemperaturePoint { time_utc: p.time, temp_kelvin: p.temp_k })
                .collect(),
            ForecastBody::Parallel { times, values } => {
                if times.len() != values.len() {
                    return Err(EngineError::InvalidResponse(
                        "forecast times/values length mismatch".into(),
                    ));
                }
                times
                    .into_iter()
                    .zip(values)
                    .map(|(time_utc, temp_kelvin)| TemperaturePoint { time_utc, temp_kelvin })
                    .collect()
            }
        };

        if points.is_empty() {
            return Err(EngineError::EmptyForecast);
        }

        Ok(Forecast {
            station_code: station_code.to_string(),
            event_day,
            start_utc,
            hours,
            fetched_at_utc,
            points,
        })
    }

    async fn get_with_retry(&self, url: &str) -> EngineResult<ForecastBody> {
        let mut attempt: u32 = 0;

        loop {
            let resp = self
                .client
                .get(url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status();
                    if status.is_success() {
                        return r.json::<ForecastBody>().await.map_err(|e| EngineError::InvalidResponse(e.to_string()));
                    }
                    if !status.is_server_error() && status.as_u16() != 429 {
                        let body = r.text().await.unwrap_or_default();
                        return Err(EngineError::InvalidResponse(format!("HTTP {status}: {body}")));
                    }
                }
                Err(_) => {}
            }

            attempt += 1;
            if attempt > self.max_retries {
                return Err(EngineError::TransientFetch("exhausted retries fetching forecast".into()));
            }
            let backoff_ms = std::cmp::min(attempt * attempt * 200, 5_000);
            let jitter = 0.5 + rand::random::<f64>() * 0.5;
            tokio::time::sleep(Duration::from_millis((backoff_ms as f64 * jitter) as u64)).await;
        }
    }
}
