//! Per-station calibration (§4.1, optional): a 12x24 month x hour bias
//! matrix in °C plus a scalar elevation offset, loaded once per station from
//! `calibration/station_calibration_{STATION}.json` (§6).
//!
//! All operations are in-place on a fixed-size array. No heap allocation
//! after load. The correction is a pure add in °C (§8 property 12:
//! calibration additivity), which we preserve by adding the same Celsius
//! delta to the Kelvin reading (ΔK == ΔC).

use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationTable {
    /// `bias_c[month - 1][hour]`, in °C.
    bias_c: [[f64; 24]; 12],
    elevation_offset_c: f64,
}

impl CalibrationTable {
    pub fn load_json(path: &Path) -> EngineResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(EngineError::from)
    }

    pub fn identity() -> Self {
        Self { bias_c: [[0.0; 24]; 12], elevation_offset_c: 0.0 }
    }

    /// Applies the bias for `(month, hour)` to a Kelvin reading.
    #[inline]
    pub fn apply(&self, temp_kelvin: f64, month: u32, hour: u32) -> f64 {
        let m = ((month.saturating_sub(1)) as usize).min(11);
        let h = (hour as usize).min(23);
        temp_kelvin + self.bias_c[m][h] + self.elevation_offset_c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_noop() {
        let table = CalibrationTable::identity();
        assert_eq!(table.apply(280.0, 11, 12), 280.0);
    }

    #[test]
    fn test_bias_is_additive() {
        let mut table = CalibrationTable::identity();
        table.bias_c[10][12] = 1.5;
        table.elevation_offset_c = 0.2;

        let once = table.apply(280.0, 11, 12);
        assert!((once - 281.7).abs() < 1e-9);

        // Applying calibration twice in a row equals applying a doubled
        // correction (property 12), since the transform is a pure add.
        let delta = once - 280.0;
        let twice = table.apply(once, 11, 12);
        assert!((twice - (280.0 + 2.0 * delta)).abs() < 1e-9);
    }

    #[test]
    fn test_month_hour_clamped() {
        let mut table = CalibrationTable::identity();
        table.bias_c[11][23] = 3.0;
        // month=13 is out of range but clamps to december (index 11)
        assert_eq!(table.apply(280.0, 13, 23), 283.0);
    }
}
