use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-wide environment configuration. Read once at startup, never reloaded.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub forecast_base_url: String,
    pub forecast_api_key: String,
    pub market_base_url: String,
    pub metar_base_url: String,
    pub data_dir: PathBuf,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::ConfigInvalid(format!("SERVER_PORT: {e}")))?;

        Ok(Self {
            forecast_base_url: env_var_or(
                "FORECAST_BASE_URL",
                "https://api.weather-forecast.example/v1",
            ),
            forecast_api_key: env_var("FORECAST_API_KEY")?,
            market_base_url: env_var_or(
                "MARKET_BASE_URL",
                "https://api.elections.kalshi.com/trade-api/v2",
            ),
            metar_base_url: env_var_or(
                "METAR_BASE_URL",
                "https://aviationweather.gov/api/data",
            ),
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            server_port,
        })
    }
}

fn env_var(key: &str) -> EngineResult<String> {
    std::env::var(key).map_err(|_| EngineError::ConfigInvalid(format!("missing env var: {key}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

// ── Live, reloadable engine configuration (§6, §9) ──
//
// Passed into the Engine as an immutable snapshot. Live updates publish a new
// snapshot via `arc_swap::ArcSwap`; a cycle in flight always sees the snapshot
// it started with (§5, §9 "global mutable config" redesign flag).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelMode {
    Spread,
    Bands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Paper,
    Live,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradingConfig {
    pub edge_min: f64,
    pub fee_bp: f64,
    pub slippage_bp: f64,
    pub kelly_cap: f64,
    pub per_market_cap: f64,
    pub liquidity_min_usd: f64,
    pub daily_bankroll_cap: f64,
    pub bankroll: f64,
    pub dust_size_usd: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            edge_min: 0.05,
            fee_bp: 50.0,
            slippage_bp: 30.0,
            kelly_cap: 0.10,
            per_market_cap: 500.0,
            liquidity_min_usd: 1000.0,
            daily_bankroll_cap: 3000.0,
            bankroll: 3000.0,
            dust_size_usd: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbabilityModelConfig {
    pub model_mode: ModelMode,
    pub zeus_likely_pct: f64,
    pub zeus_possible_pct: f64,
    pub sigma_default: f64,
    pub sigma_min: f64,
    pub sigma_max: f64,
}

impl Default for ProbabilityModelConfig {
    fn default() -> Self {
        Self {
            model_mode: ModelMode::Spread,
            zeus_likely_pct: 0.68,
            zeus_possible_pct: 0.95,
            sigma_default: 2.0,
            sigma_min: 0.5,
            sigma_max: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub polymarket_double_rounding: bool,
    pub station_calibration: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            polymarket_double_rounding: false,
            station_calibration: false,
        }
    }
}

/// Fields changeable without a restart (§4.6 "Configuration change").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiveTunables {
    pub trading: TradingConfig,
    pub probability_model: ProbabilityModelConfig,
    pub feature_toggles: FeatureToggles,
}

impl Default for LiveTunables {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            probability_model: ProbabilityModelConfig::default(),
            feature_toggles: FeatureToggles::default(),
        }
    }
}

/// Full engine configuration, as accepted by the lifecycle `start`/`restart`
/// control surface (§6). Fields outside `live` change the Task set or cadence
/// and therefore require a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub active_stations: Vec<String>,
    pub interval_seconds: u64,
    pub lookahead_days: u32,
    pub execution_mode: ExecutionMode,
    pub cycle_timeout_secs: u64,
    pub max_input_age_secs: u64,
    pub max_retries: u32,
    pub shutdown_grace_secs: u64,
    pub max_concurrent_tasks: usize,
    pub live: LiveTunables,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active_stations: Vec::new(),
            interval_seconds: 900,
            lookahead_days: 2,
            execution_mode: ExecutionMode::Paper,
            cycle_timeout_secs: 120,
            max_input_age_secs: 120,
            max_retries: 3,
            shutdown_grace_secs: 30,
            max_concurrent_tasks: 8,
            live: LiveTunables::default(),
        }
    }
}

impl EngineConfig {
    /// Validates before apply (§7 `CONFIG_INVALID`). Does not mutate `self`.
    pub fn validate(&self) -> EngineResult<()> {
        if self.active_stations.is_empty() {
            return Err(EngineError::ConfigInvalid("active_stations must be non-empty".into()));
        }
        if self.interval_seconds == 0 {
            return Err(EngineError::ConfigInvalid("interval_seconds must be > 0".into()));
        }
        if self.lookahead_days == 0 {
            return Err(EngineError::ConfigInvalid("lookahead_days must be > 0".into()));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(EngineError::ConfigInvalid("max_concurrent_tasks must be > 0".into()));
        }
        let t = &self.live.trading;
        if t.kelly_cap <= 0.0 || t.kelly_cap > 1.0 {
            return Err(EngineError::ConfigInvalid("kelly_cap must be in (0,1]".into()));
        }
        if t.daily_bankroll_cap < 0.0 || t.per_market_cap < 0.0 || t.liquidity_min_usd < 0.0 {
            return Err(EngineError::ConfigInvalid("trading caps must be non-negative".into()));
        }
        let p = &self.live.probability_model;
        if p.sigma_min <= 0.0 || p.sigma_max < p.sigma_min {
            return Err(EngineError::ConfigInvalid("sigma_min/sigma_max invalid".into()));
        }
        if !(0.5 < p.zeus_likely_pct && p.zeus_likely_pct < p.zeus_possible_pct && p.zeus_possible_pct < 1.0) {
            return Err(EngineError::ConfigInvalid(
                "require 0.5 < zeus_likely_pct < zeus_possible_pct < 1".into(),
            ));
        }
        Ok(())
    }

    /// True if changing from `self` to `other` touches a field that changes the
    /// Task set or cadence and therefore requires a restart (§4.6).
    pub fn requires_restart(&self, other: &EngineConfig) -> bool {
        self.active_stations != other.active_stations
            || self.interval_seconds != other.interval_seconds
            || self.lookahead_days != other.lookahead_days
            || self.execution_mode != other.execution_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid_once_stations_set() {
        let mut cfg = EngineConfig::default();
        cfg.active_stations.push("EGLC".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_stations_rejected() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_restart_required_on_cadence_change() {
        let mut a = EngineConfig::default();
        a.active_stations.push("EGLC".into());
        let mut b = a.clone();
        b.interval_seconds = 600;
        assert!(a.requires_restart(&b));

        let mut c = a.clone();
        c.live.trading.edge_min = 0.1;
        assert!(!a.requires_restart(&c));
    }
}
