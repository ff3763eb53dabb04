//! Shared state: Task identity, Decision/Trade records, and the channel
//! wiring between the Engine, Event Bus, and HTTP/WS surface (§3, §5).

use crate::config::{AppConfig, EngineConfig};
use crate::market::Bracket;
use arc_swap::ArcSwap;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

/// The unit of scheduling: one `(station, event_day)` (§3, §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct TaskId {
    pub station_code: String,
    pub event_day: NaiveDate,
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.station_code, self.event_day)
    }
}

/// A produced pricing decision for one bracket (§3). Rejected candidates are
/// still represented here with `size_usd = 0.0`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Decision {
    pub bracket: Bracket,
    pub p_zeus: f64,
    pub p_market: f64,
    pub edge: f64,
    pub f_kelly: f64,
    pub size_usd: f64,
    pub reason_tags: Vec<&'static str>,
    pub decision_time_utc: DateTime<Utc>,
    pub station_code: String,
    pub event_day: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Pending,
    Win,
    Loss,
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Win => write!(f, "win"),
            Self::Loss => write!(f, "loss"),
        }
    }
}

/// A persisted Trade: a Decision plus venue/outcome fields filled at write
/// time and later updated by out-of-scope resolution (§3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Trade {
    pub decision: Decision,
    pub venue: String,
    pub outcome: TradeOutcome,
    pub realized_pnl: Option<f64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub winner_bracket: Option<String>,
}

impl Trade {
    pub fn pending(decision: Decision, venue: String) -> Self {
        Self { decision, venue, outcome: TradeOutcome::Pending, realized_pnl: None, resolved_at: None, winner_bracket: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    Selected,
    Fetching,
    Mapping,
    Deciding,
    Snapshotting,
    Brokering,
    Published,
}

/// Process-wide running total against `daily_bankroll_cap`, reset at local
/// midnight (§5, §9 -- adopted as process-wide, not per-station).
#[derive(Debug, Default)]
pub struct DailyBankroll {
    pub day: Option<NaiveDate>,
    pub used_usd: f64,
}

impl DailyBankroll {
    /// Resets the running total if `today` has rolled over, then returns the
    /// current used amount.
    pub fn roll_and_get(&mut self, today: NaiveDate) -> f64 {
        if self.day != Some(today) {
            self.day = Some(today);
            self.used_usd = 0.0;
        }
        self.used_usd
    }

    pub fn add(&mut self, amount: f64) {
        self.used_usd += amount;
    }
}

/// Application-wide shared state, handed to the HTTP server. The Engine
/// itself owns no shared mutable state beyond the `engine_config` snapshot
/// and `bus` handle it shares with this struct (§9: the Engine owns all
/// components; the server is just another observer/controller).
pub struct AppState {
    pub app_config: AppConfig,
    pub engine_config: Arc<ArcSwap<EngineConfig>>,
    pub bus: crate::bus::EventBus,
    pub lifecycle: Arc<crate::lifecycle::LifecycleController>,
}

impl AppState {
    pub fn new(
        app_config: AppConfig,
        engine_config: Arc<ArcSwap<EngineConfig>>,
        bus: crate::bus::EventBus,
        lifecycle: Arc<crate::lifecycle::LifecycleController>,
    ) -> Arc<Self> {
        Arc::new(Self { app_config, engine_config, bus, lifecycle })
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_daily_bankroll_resets_on_new_day() {
        let mut b = DailyBankroll::default();
        let d1 = NaiveDate::from_ymd_opt(2025, 11, 19).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        assert_eq!(b.roll_and_get(d1), 0.0);
        b.add(300.0);
        assert_eq!(b.roll_and_get(d1), 300.0);
        assert_eq!(b.roll_and_get(d2), 0.0);
    }
}
