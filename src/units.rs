//! Temperature conversions, local-day windowing across DST, and the
//! whole-degree rounding chain used by venues that resolve on whole-degree
//! METAR readings.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

/// `F = (K - 273.15) * 9/5 + 32`.
#[inline]
pub fn kelvin_to_fahrenheit(k: f64) -> f64 {
    (k - 273.15) * 9.0 / 5.0 + 32.0
}

#[inline]
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

#[inline]
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Round to `decimals` decimal places, half away from zero.
#[inline]
pub fn round_half_up(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// The `[start_utc, start_utc + hours)` UTC window corresponding to local
/// midnight of `event_day` in `iana_zone`, correct across DST transitions.
pub fn event_day_window(event_day: chrono::NaiveDate, iana_zone: &Tz, hours: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = iana_zone
        .from_local_datetime(&event_day.and_hms_opt(0, 0, 0).expect("valid midnight"))
        .single()
        .unwrap_or_else(|| {
            // DST spring-forward gap: fall back to the earliest valid instant.
            iana_zone
                .from_local_datetime(&event_day.and_hms_opt(0, 0, 0).unwrap())
                .earliest()
                .expect("ambiguous local midnight must resolve to some instant")
        });
    let start_utc = local_midnight.with_timezone(&Utc);
    let end_utc = start_utc + Duration::hours(hours);
    (start_utc, end_utc)
}

/// Daily-high mean, uncalibrated: the maximum Fahrenheit value across hourly
/// points already converted from Kelvin.
pub fn daily_high_mean(hourly_fahrenheit: &[f64]) -> Option<f64> {
    hourly_fahrenheit
        .iter()
        .copied()
        .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}

/// The two-step "Polymarket" rounding chain (§4.1, §8 property 11):
/// round each hourly Fahrenheit value to one decimal, take the maximum, then
/// round that maximum to the nearest whole degree, half-up.
pub fn polymarket_rounded_high(hourly_fahrenheit: &[f64]) -> Option<f64> {
    let rounded_hourly: Vec<f64> = hourly_fahrenheit.iter().map(|f| round_half_up(*f, 1)).collect();
    let max = daily_high_mean(&rounded_hourly)?;
    Some(round_half_up(max, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kelvin_to_fahrenheit() {
        // 0C = 273.15K = 32F
        assert!((kelvin_to_fahrenheit(273.15) - 32.0).abs() < 1e-9);
        // 100C = 373.15K = 212F
        assert!((kelvin_to_fahrenheit(373.15) - 212.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(45.5, 0), 46.0);
        assert_eq!(round_half_up(45.49, 0), 45.0);
        assert_eq!(round_half_up(45.428, 1), 45.4);
        assert_eq!(round_half_up(45.35, 1), 45.4);
    }

    #[test]
    fn test_polymarket_rounding_boundary() {
        // Seed scenario from spec: hourly highs [45.428, 45.50, 45.32]
        let highs = [45.428, 45.50, 45.32];
        let rounded = polymarket_rounded_high(&highs).unwrap();
        assert_eq!(rounded, 46.0);

        let raw_max = daily_high_mean(&highs).unwrap();
        assert!((raw_max - 45.5).abs() < 1e-9);
    }

    #[test]
    fn test_daily_high_mean_empty() {
        assert!(daily_high_mean(&[]).is_none());
    }

    #[test]
    fn test_event_day_window_is_24h_in_non_dst_zone() {
        use chrono::Timelike;
        let tz: Tz = "Etc/UTC".parse().unwrap();
        let day = chrono::NaiveDate::from_ymd_opt(2025, 11, 19).unwrap();
        let (start, end) = event_day_window(day, &tz, 24);
        assert_eq!((end - start).num_hours(), 24);
        assert_eq!(start.hour(), 0);
        assert_eq!(start.minute(), 0);
    }
}
