//! Immutable station registry, loaded once at startup from a CSV catalog
//! (§6 `registry/stations.csv`).

use crate::errors::{EngineError, EngineResult};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueTag {
    Polymarket,
    Kalshi,
}

impl VenueTag {
    /// §9 Venue capability: does this venue resolve against whole-degree
    /// METAR readings (and therefore require the double-rounding chain)?
    #[inline]
    pub fn resolves_on_whole_degrees(&self) -> bool {
        matches!(self, VenueTag::Polymarket)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Station {
    pub code: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub iana_zone: Tz,
    pub venue_tag: VenueTag,
}

#[derive(Debug, Deserialize)]
struct StationRow {
    code: String,
    city: String,
    latitude: f64,
    longitude: f64,
    iana_zone: String,
    venue_tag: String,
}

/// Immutable catalog of stations, keyed by station code. Built once and
/// never mutated for the lifetime of the process.
pub struct StationRegistry {
    stations: HashMap<String, Station>,
}

impl StationRegistry {
    pub fn load_csv(path: &Path) -> EngineResult<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| EngineError::ConfigInvalid(format!("stations.csv: {e}")))?;

        let mut stations = HashMap::new();
        for row in reader.deserialize::<StationRow>() {
            let row = row.map_err(|e| EngineError::ConfigInvalid(format!("stations.csv row: {e}")))?;
            let iana_zone: Tz = row
                .iana_zone
                .parse()
                .map_err(|_| EngineError::ConfigInvalid(format!("unknown IANA zone: {}", row.iana_zone)))?;
            let venue_tag = match row.venue_tag.as_str() {
                "polymarket" => VenueTag::Polymarket,
                "kalshi" => VenueTag::Kalshi,
                other => return Err(EngineError::ConfigInvalid(format!("unknown venue_tag: {other}"))),
            };
            stations.insert(
                row.code.clone(),
                Station {
                    code: row.code,
                    city: row.city,
                    latitude: row.latitude,
                    longitude: row.longitude,
                    iana_zone,
                    venue_tag,
                },
            );
        }

        Ok(Self { stations })
    }

    #[inline]
    pub fn get(&self, code: &str) -> Option<&Station> {
        self.stations.get(code)
    }

    pub fn active(&self, active_stations: &[String]) -> Vec<&Station> {
        active_stations.iter().filter_map(|c| self.stations.get(c)).collect()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.stations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(contents: &str) -> tempfile_path::TempCsv {
        tempfile_path::TempCsv::new(contents)
    }

    mod tempfile_path {
        use std::io::Write;
        use std::path::PathBuf;

        pub struct TempCsv {
            path: PathBuf,
        }

        impl TempCsv {
            pub fn new(contents: &str) -> Self {
                let path = std::env::temp_dir().join(format!("stations_test_{}.csv", std::process::id()));
                let mut f = std::fs::File::create(&path).unwrap();
                f.write_all(contents.as_bytes()).unwrap();
                Self { path }
            }

            pub fn path(&self) -> &std::path::Path {
                &self.path
            }
        }

        impl Drop for TempCsv {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn test_load_and_lookup() {
        let csv = write_csv(
            "code,city,latitude,longitude,iana_zone,venue_tag\n\
             EGLC,London,51.505,0.055,Europe/London,polymarket\n\
             KLGA,New York,40.777,-73.873,America/New_York,kalshi\n",
        );
        let registry = StationRegistry::load_csv(csv.path()).unwrap();
        assert_eq!(registry.len(), 2);
        let eglc = registry.get("EGLC").unwrap();
        assert_eq!(eglc.city, "London");
        assert!(eglc.venue_tag.resolves_on_whole_degrees());
        let klga = registry.get("KLGA").unwrap();
        assert!(!klga.venue_tag.resolves_on_whole_degrees());
    }

    #[test]
    fn test_unknown_zone_rejected() {
        let csv = write_csv(
            "code,city,latitude,longitude,iana_zone,venue_tag\n\
             BAD,Nowhere,0,0,Not/AZone,kalshi\n",
        );
        assert!(StationRegistry::load_csv(csv.path()).is_err());
    }
}
