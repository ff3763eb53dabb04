//! METAR Client (C5): ground-truth observed temperatures, used only for
//! snapshot enrichment here; resolution itself is out of scope (§1, §6).

use crate::errors::{EngineError, EngineResult};
use crate::units::celsius_to_fahrenheit;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct MetarObservation {
    temp: f64,
    #[serde(rename = "obsTime")]
    obs_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetarReading {
    pub temp_fahrenheit: f64,
    pub observed_at_utc: DateTime<Utc>,
}

pub struct MetarClient {
    client: Client,
    base_url: String,
}

impl MetarClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build().unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetches the most recent observation for an ICAO station code.
    pub async fn latest(&self, icao_code: &str) -> EngineResult<MetarReading> {
        let url = format!("{}/metar?ids={icao_code}&format=json", self.base_url);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::InvalidResponse(format!("METAR HTTP {status}")));
        }

        let observations: Vec<MetarObservation> = resp.json().await?;
        let latest = observations
            .into_iter()
            .max_by_key(|o| o.obs_time)
            .ok_or_else(|| EngineError::InvalidResponse(format!("no METAR observations for {icao_code}")))?;

        Ok(MetarReading {
            temp_fahrenheit: celsius_to_fahrenheit(latest.temp),
            observed_at_utc: latest.obs_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction_trims_trailing_slash() {
        let client = MetarClient::new("https://aviationweather.gov/api/data/");
        assert_eq!(client.base_url, "https://aviationweather.gov/api/data");
    }
}
