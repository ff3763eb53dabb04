mod broker;
mod bus;
mod config;
mod engine;
mod errors;
mod forecast;
mod lifecycle;
mod market;
mod metar;
mod models;
mod registry;
mod risk;
mod server;
mod snapshot;
mod state;
mod units;

use arc_swap::ArcSwap;
use market::client::MarketClient;
use models::calibration::CalibrationTable;
use registry::StationRegistry;
use state::AppState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    eprintln!("[zeus_engine] binary started, setting up logging...");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("zeus engine starting");

    let app_config = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let registry_path = app_config.data_dir.join("registry").join("stations.csv");
    let registry = match StationRegistry::load_csv(&registry_path) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            tracing::error!("station registry load error ({}): {e}", registry_path.display());
            std::process::exit(1);
        }
    };

    let calibration = load_calibration_tables(&app_config.data_dir, &registry);

    let forecast_client = Arc::new(forecast::client::ForecastClient::new(
        &app_config.forecast_base_url,
        &app_config.forecast_api_key,
        3,
        Duration::from_secs(20),
    ));
    let metar_client = Arc::new(metar::MetarClient::new(&app_config.metar_base_url));
    let venue: Arc<dyn market::venue::Venue> = Arc::new(MarketClient::new(&app_config.market_base_url, 3, Duration::from_secs(20), true));
    let snapshot_store = Arc::new(snapshot::SnapshotStore::new(&app_config.data_dir));
    let paper_broker = Arc::new(broker::PaperBroker::new(&app_config.data_dir));

    let initial_engine_config = load_or_default_engine_config(&app_config.data_dir);
    let engine_config = Arc::new(ArcSwap::from_pointee(initial_engine_config));
    let bus = bus::EventBus::new(2048);

    let engine = Arc::new(engine::Engine {
        registry,
        forecast_client,
        metar_client,
        venue,
        calibration: Arc::new(calibration),
        snapshot_store,
        paper_broker,
        bus: bus.clone(),
        engine_config: engine_config.clone(),
        daily_bankroll: Arc::new(tokio::sync::Mutex::new(state::DailyBankroll::default())),
    });

    let lifecycle = Arc::new(lifecycle::LifecycleController::new(engine.clone(), app_config.data_dir.clone()));

    let app_state = AppState::new(app_config.clone(), engine_config, bus, lifecycle.clone());

    // Auto-resume if a persisted engine_config.json exists from a prior run
    // that did not shut down cleanly (crash recovery is handled inside
    // `LifecycleController::start` via the stale-PID check).
    if app_config.data_dir.join("config").join("engine_config.json").exists() {
        let cfg = (*lifecycle.get_engine_config()).clone();
        if !cfg.active_stations.is_empty() {
            if let Err(e) = lifecycle.start(cfg).await {
                tracing::warn!("auto-resume start failed: {e}");
            }
        }
    }

    let router = server::build_router(app_state);
    let addr = format!("0.0.0.0:{}", app_config.server_port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        tracing::error!("bind error: {e}");
        std::process::exit(1);
    });

    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!("server error: {e}");
    }
}

fn load_calibration_tables(data_dir: &std::path::Path, registry: &StationRegistry) -> HashMap<String, CalibrationTable> {
    let mut tables = HashMap::new();
    for code in registry.codes() {
        let path = data_dir.join("calibration").join(format!("station_calibration_{code}.json"));
        if let Ok(table) = CalibrationTable::load_json(&path) {
            tables.insert(code.to_string(), table);
        }
    }
    tables
}

fn load_or_default_engine_config(data_dir: &std::path::Path) -> config::EngineConfig {
    let path = data_dir.join("config").join("engine_config.json");
    std::fs::read_to_string(path).ok().and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default()
}
