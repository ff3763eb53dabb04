//! Dynamic Engine (C10): schedules per-`(station, event_day)` evaluation
//! cycles and orchestrates the Forecast/Market clients, Probability Mapper,
//! Edge & Sizer, Snapshot Store and Paper Broker (§2, §4.6).

pub mod scheduler;

use crate::broker::PaperBroker;
use crate::bus::{EngineEvent, EventBus};
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::forecast::client::ForecastClient;
use crate::market::venue::Venue;
use crate::metar::MetarClient;
use crate::models::calibration::CalibrationTable;
use crate::models::mapper::map_forecast_to_probabilities;
use crate::registry::StationRegistry;
use crate::risk::edge::{compute_edge, EdgeOutcome, EdgeParams};
use crate::risk::sizer::size_candidate;
use crate::snapshot::{SnapshotKind, SnapshotStore};
use crate::state::{DailyBankroll, Decision, TaskId, TaskStage, Trade};
use arc_swap::ArcSwap;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Owns every collaborator the Engine talks to in one cycle. Cheap to
/// clone (all fields are `Arc`-backed) so each spawned worker gets its own
/// handle without sharing a lock beyond the daily bankroll total (§5).
#[derive(Clone)]
pub struct Engine {
    pub registry: Arc<StationRegistry>,
    pub forecast_client: Arc<ForecastClient>,
    pub metar_client: Arc<MetarClient>,
    pub venue: Arc<dyn Venue>,
    pub calibration: Arc<HashMap<String, CalibrationTable>>,
    pub snapshot_store: Arc<SnapshotStore>,
    pub paper_broker: Arc<PaperBroker>,
    pub bus: EventBus,
    pub engine_config: Arc<ArcSwap<EngineConfig>>,
    pub daily_bankroll: Arc<Mutex<DailyBankroll>>,
}

/// Per-Task cycle outcome: every produced Decision (accepted and rejected)
/// plus a cheap accepted/rejected tally for the `cycle_complete` event.
pub struct CycleOutcome {
    pub decisions: Vec<Decision>,
    pub accepted: usize,
}

/// Zeus snapshot payload (C8, §4.4): the fetched forecast plus, best-effort,
/// the latest METAR observation for the station -- ground truth enrichment
/// only (C5, §1). A missing/failed METAR fetch never fails the cycle.
#[derive(serde::Serialize)]
struct ZeusSnapshot<'a> {
    forecast: &'a crate::forecast::Forecast,
    observed: Option<crate::metar::MetarReading>,
}

/// Everything the commit phase (snapshotting + brokering) needs, handed off
/// from the abortable deciding phase. Owned outright so the commit phase has
/// no borrow back into the cancellable `decide` future.
struct DecideOutcome {
    station: crate::registry::Station,
    forecast: crate::forecast::Forecast,
    prices: HashMap<String, crate::market::BracketPrice>,
    decisions: Vec<Decision>,
    accepted: usize,
}

impl Engine {
    /// Enumerates active Tasks for the current tick: every active station,
    /// crossed with `{today_local .. today_local + lookahead_days - 1}` in
    /// the station's own zone (§4.6). Whether the venue actually exposes a
    /// market for a given day is discovered inside the cycle itself rather
    /// than at enumeration time -- enumerating async would require a market
    /// round-trip per candidate day before scheduling even starts, which
    /// adds a full network round trip to every tick for no benefit since an
    /// absent market fails the cycle harmlessly with `INVALID_BRACKETS`.
    pub fn enumerate_tasks(&self, cfg: &EngineConfig) -> Vec<TaskId> {
        let mut tasks = Vec::new();
        for station in self.registry.active(&cfg.active_stations) {
            let today_local = Utc::now().with_timezone(&station.iana_zone).date_naive();
            for offset in 0..cfg.lookahead_days {
                let event_day = today_local + ChronoDuration::days(offset as i64);
                tasks.push(TaskId { station_code: station.code.clone(), event_day });
            }
        }
        tasks
    }

    /// Runs one full cycle for a single Task: `fetching -> mapping ->
    /// deciding -> snapshotting -> brokering -> published` (§4.6). Any
    /// stage failure returns `Err` and the caller is responsible for
    /// emitting `cycle_failed`.
    pub async fn run_task_cycle(&self, task: TaskId, cancel: CancellationToken) -> EngineResult<CycleOutcome> {
        let cfg = self.engine_config.load_full();
        self.bus.publish(EngineEvent::cycle_started(&task));

        let decide = async {
            let station = self
                .registry
                .get(&task.station_code)
                .ok_or_else(|| EngineError::ConfigInvalid(format!("unknown station {}", task.station_code)))?;

            let (start_utc, end_utc) = crate::units::event_day_window(task.event_day, &station.iana_zone, 24);
            let hours = (end_utc - start_utc).num_hours() as u32;

            // fetching: forecast + bracket discovery run in parallel (§4.6).
            self.bus.publish(EngineEvent::stage_changed(&task, TaskStage::Fetching));
            let (forecast, brackets) = tokio::try_join!(
                self.forecast_client.fetch(&station.code, task.event_day, station.latitude, station.longitude, start_utc, hours),
                self.venue.list_brackets(&station.city, task.event_day),
            )?;

            let bracket_ids: Vec<String> = brackets.iter().map(|b| b.market_id.clone()).collect();
            let price_pairs = self.venue.prices(&bracket_ids).await?;
            let prices: HashMap<String, crate::market::BracketPrice> = price_pairs.into_iter().collect();

            let market_fetched_at = prices.values().map(|p| p.fetched_at_utc).max().unwrap_or(forecast.fetched_at_utc);

            let max_input_age = Duration::from_secs(cfg.max_input_age_secs);
            let now = Utc::now();
            let forecast_age = (now - forecast.fetched_at_utc).to_std().unwrap_or_default();
            let market_age = (now - market_fetched_at).to_std().unwrap_or_default();
            if forecast_age > max_input_age || market_age > max_input_age {
                return Err(EngineError::StaleInput(format!(
                    "forecast age {forecast_age:?} or market age {market_age:?} exceeds max_input_age {max_input_age:?}"
                )));
            }

            // mapping
            self.bus.publish(EngineEvent::stage_changed(&task, TaskStage::Mapping));
            let calibration = self.calibration.get(&station.code);
            let probs = map_forecast_to_probabilities(
                &forecast,
                &brackets,
                calibration,
                station.venue_tag.resolves_on_whole_degrees(),
                &cfg.live.probability_model,
                cfg.live.feature_toggles.polymarket_double_rounding,
            )?;

            // deciding
            self.bus.publish(EngineEvent::stage_changed(&task, TaskStage::Deciding));
            let decision_time_utc = Utc::now();
            let today_local = decision_time_utc.with_timezone(&station.iana_zone).date_naive();
            let mut decisions = Vec::with_capacity(probs.len());
            let mut accepted = 0usize;

            let mut daily_guard = self.daily_bankroll.lock().await;
            for prob in &probs {
                let price = match prices.get(&prob.bracket.market_id) {
                    Some(p) => p,
                    None => continue,
                };

                let edge_params = EdgeParams {
                    p_zeus: prob.p_zeus,
                    p_market: price.mid_prob,
                    fee_bp: cfg.live.trading.fee_bp,
                    slippage_bp: cfg.live.trading.slippage_bp,
                };

                let (size_usd, f_kelly, mut reason_tags) = match compute_edge(&edge_params, cfg.live.trading.edge_min, 1e-6) {
                    EdgeOutcome::DegenerateProb => (0.0, 0.0, vec!["degenerate_price"]),
                    EdgeOutcome::BelowEdgeMin => (0.0, 0.0, vec!["below_edge_min"]),
                    EdgeOutcome::Ok(edge) => {
                        let daily_used = daily_guard.roll_and_get(today_local);
                        let outcome = size_candidate(edge, price.mid_prob, &cfg.live.trading, price.available_usd_at_top_of_book, daily_used);
                        if outcome.size_usd > 0.0 {
                            daily_guard.add(outcome.size_usd);
                        }
                        (outcome.size_usd, outcome.f_kelly, outcome.reason_tags.into_vec())
                    }
                };

                let edge = crate::risk::edge::raw_edge(&edge_params);
                if size_usd <= 0.0 && reason_tags.is_empty() {
                    reason_tags.push("below_edge_min");
                }

                decisions.push(Decision {
                    bracket: prob.bracket.clone(),
                    p_zeus: prob.p_zeus,
                    p_market: price.mid_prob,
                    edge,
                    f_kelly,
                    size_usd,
                    reason_tags,
                    decision_time_utc,
                    station_code: station.code.clone(),
                    event_day: task.event_day,
                });
                if size_usd > 0.0 {
                    accepted += 1;
                }
            }
            drop(daily_guard);

            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            Ok(DecideOutcome { station: station.clone(), forecast, prices, decisions, accepted })
        };

        // Cancellation is only allowed to abort the cycle up through the
        // deciding stage above. Past this point the commit phase (snapshot +
        // broker) below is never raced against `cancel` -- §4.6 requires
        // snapshot writes once begun to run to completion, and the
        // scheduler's grace-period drain already waits for that to happen.
        let timeout = Duration::from_secs(cfg.cycle_timeout_secs);
        let decide_result: EngineResult<DecideOutcome> = tokio::select! {
            r = tokio::time::timeout(timeout, decide) => match r {
                Ok(inner) => inner,
                Err(_) => Err(EngineError::StaleInput("cycle_timeout exceeded".into())),
            },
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
        };

        let result = match decide_result {
            Ok(outcome) => self.commit(&task, outcome).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                self.bus.publish(EngineEvent::stage_changed(&task, TaskStage::Published));
                self.bus.publish(EngineEvent::edges_updated(&task, &outcome.decisions));
                self.bus.publish(crate::bus::EngineEvent::CycleComplete {
                    task_id: task.to_string(),
                    decision_summary: crate::bus::DecisionSummary {
                        accepted: outcome.accepted,
                        rejected: outcome.decisions.len().saturating_sub(outcome.accepted),
                        total_size_usd: outcome.decisions.iter().map(|d| d.size_usd).sum(),
                    },
                });
            }
            Err(e) => self.bus.publish(EngineEvent::cycle_failed(&task, e.to_string())),
        }

        result
    }

    /// Snapshotting + brokering, run unconditionally to completion once the
    /// deciding stage has produced a `DecideOutcome` (§4.6).
    async fn commit(&self, task: &TaskId, outcome: DecideOutcome) -> EngineResult<CycleOutcome> {
        let DecideOutcome { station, forecast, prices, decisions, accepted } = outcome;

        // snapshotting: three artifacts sharing one fetch_time_utc. The
        // METAR reading is ground-truth enrichment only -- a failed
        // fetch is logged and left absent, never a cycle failure.
        self.bus.publish(EngineEvent::stage_changed(task, TaskStage::Snapshotting));
        let fetch_time = forecast.fetched_at_utc;
        let observed = match self.metar_client.latest(&station.code).await {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!("METAR fetch failed for {}: {e}", station.code);
                None
            }
        };
        let zeus_snapshot = ZeusSnapshot { forecast: &forecast, observed };
        self.snapshot_store.write(SnapshotKind::Zeus, &station.code, task.event_day, fetch_time, &zeus_snapshot)?;
        self.snapshot_store.write(SnapshotKind::Polymarket, &station.city, task.event_day, fetch_time, &prices)?;
        self.snapshot_store.write(SnapshotKind::Decisions, &station.code, task.event_day, fetch_time, &decisions)?;

        // brokering: only accepted decisions are appended to the trade log.
        self.bus.publish(EngineEvent::stage_changed(task, TaskStage::Brokering));
        for decision in decisions.iter().filter(|d| d.size_usd > 0.0) {
            let venue_name = if station.venue_tag.resolves_on_whole_degrees() { "polymarket" } else { "kalshi" };
            let trade = Trade::pending(decision.clone(), venue_name.to_string());
            self.paper_broker.append(&trade, decision.f_kelly)?;
            self.bus.publish(EngineEvent::trade_placed(trade));
        }

        Ok(CycleOutcome { decisions, accepted })
    }
}
