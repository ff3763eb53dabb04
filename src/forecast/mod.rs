pub mod client;

use chrono::{DateTime, NaiveDate, Utc};

/// A single hourly temperature reading, Kelvin as the transport unit (§3).
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct TemperaturePoint {
    pub time_utc: DateTime<Utc>,
    pub temp_kelvin: f64,
}

/// An hourly forecast timeseries for one station/event_day, fetched once
/// per cycle. Two forecasts for the same `(station, event_day)` but
/// different `fetched_at_utc` are both valid and must both be retained (§3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Forecast {
    pub station_code: String,
    pub event_day: NaiveDate,
    pub start_utc: DateTime<Utc>,
    pub hours: u32,
    pub fetched_at_utc: DateTime<Utc>,
    pub points: Vec<TemperaturePoint>,
}

impl Forecast {
    pub fn hourly_fahrenheit(&self) -> Vec<f64> {
        self.points.iter().map(|p| crate::units::kelvin_to_fahrenheit(p.temp_kelvin)).collect()
    }
}
