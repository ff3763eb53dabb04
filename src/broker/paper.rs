//! Appends approved decisions to `trades/{event_day}/paper_trades.csv` under
//! an exclusive per-file lock, with an explicit flush+fsync after each
//! append (§4.5, §6).
//!
//! The broker never reads the file back; resolution and reporting are
//! out of scope. Column order is fixed and must match §6 exactly.

use crate::errors::EngineResult;
use crate::state::Trade;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const HEADER: &str = "timestamp,station_code,bracket_name,bracket_lower_f,bracket_upper_f,market_id,edge,edge_pct,f_kelly,size_usd,p_zeus,p_mkt,sigma_z,reason,outcome,realized_pnl,venue,resolved_at,winner_bracket\n";

pub struct PaperBroker {
    data_dir: PathBuf,
}

impl PaperBroker {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn path_for(&self, event_day: chrono::NaiveDate) -> PathBuf {
        self.data_dir.join("trades").join(event_day.format("%Y-%m-%d").to_string()).join("paper_trades.csv")
    }

    /// Appends one Trade row. `outcome` is always written as `pending` at
    /// this point; resolution fills it in later out of scope.
    pub fn append(&self, trade: &Trade, sigma_z: f64) -> EngineResult<()> {
        let path = self.path_for(trade.decision.event_day);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;
        file.lock_exclusive()?;

        let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(true);
        let mut writer = &file;
        if is_new {
            writer.write_all(HEADER.as_bytes())?;
        }

        let d = &trade.decision;
        let bracket_name = bracket_display(&d.bracket);
        let row = format!(
            "{},{},{},{},{},{},{:.6},{:.4},{:.6},{:.2},{:.6},{:.6},{:.4},{},{},,{},,\n",
            d.decision_time_utc.to_rfc3339(),
            d.station_code,
            bracket_name,
            d.bracket.lower_f,
            d.bracket.upper_f,
            d.bracket.market_id,
            d.edge,
            d.edge * 100.0,
            d.f_kelly,
            d.size_usd,
            d.p_zeus,
            d.p_market,
            sigma_z,
            d.reason_tags.join("|"),
            trade.outcome,
            trade.venue,
        );
        writer.write_all(row.as_bytes())?;
        writer.flush()?;
        file.sync_all()?;

        fs2::FileExt::unlock(&file)?;
        Ok(())
    }
}

fn bracket_display(b: &crate::market::Bracket) -> String {
    if b.is_under {
        format!("<{}", b.upper_f)
    } else if b.is_over {
        format!(">={}", b.lower_f)
    } else {
        format!("{}-{}", b.lower_f, b.upper_f - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Bracket;
    use crate::state::Decision;
    use chrono::Utc;

    fn sample_trade() -> Trade {
        let decision = Decision {
            bracket: Bracket { market_id: "m1".into(), lower_f: 45.0, upper_f: 46.0, is_under: false, is_over: false },
            p_zeus: 0.420,
            p_market: 0.334,
            edge: 0.078,
            f_kelly: 0.10,
            size_usd: 300.0,
            reason_tags: vec!["strong_edge", "kelly_capped"],
            decision_time_utc: Utc::now(),
            station_code: "EGLC".into(),
            event_day: chrono::NaiveDate::from_ymd_opt(2025, 11, 19).unwrap(),
        };
        Trade::pending(decision, "polymarket".into())
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = std::env::temp_dir().join(format!("zeus-broker-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let broker = PaperBroker::new(&dir);
        let trade = sample_trade();

        broker.append(&trade, 2.0).unwrap();
        broker.append(&trade, 2.0).unwrap();

        let path = broker.path_for(trade.decision.event_day);
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 rows
        assert!(lines[0].starts_with("timestamp,station_code"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
