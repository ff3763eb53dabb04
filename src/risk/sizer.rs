//! Sizer (C7, second half): capped Kelly sizing plus the ordered cap chain
//! (§4.2): per_market_cap -> liquidity_min_usd -> running daily_bankroll_cap.
//!
//! Pure function, no side effects; the caller owns the daily running total
//! (§5 "Daily-bankroll running total... access confined to a single
//! serialization point inside each cycle").

use crate::config::TradingConfig;
use smallvec::SmallVec;

pub type ReasonTags = SmallVec<[&'static str; 4]>;

#[derive(Debug, Clone)]
pub struct SizingOutcome {
    pub f_kelly: f64,
    pub size_usd: f64,
    pub reason_tags: ReasonTags,
}

/// Sizes one accepted-edge candidate. `daily_used_usd` is the running total
/// of size already committed today (process-wide, §9); the returned
/// `size_usd` has NOT yet been added to that total -- the caller does so
/// only after this candidate is finally accepted.
pub fn size_candidate(edge: f64, p_market: f64, cfg: &TradingConfig, available_usd_at_top_of_book: f64, daily_used_usd: f64) -> SizingOutcome {
    let f_kelly_raw = edge / (1.0 - p_market);
    let kelly_capped = f_kelly_raw > cfg.kelly_cap;
    let f_kelly = f_kelly_raw.min(cfg.kelly_cap).max(0.0);

    let mut tags: ReasonTags = SmallVec::new();
    tags.push("strong_edge");
    if kelly_capped {
        tags.push("kelly_capped");
    }

    let mut size_usd = f_kelly * cfg.bankroll;

    if size_usd > cfg.per_market_cap {
        size_usd = cfg.per_market_cap;
        tags.push("per_market_capped");
    }

    if available_usd_at_top_of_book < cfg.liquidity_min_usd {
        tags.push("insufficient_liquidity");
        return SizingOutcome { f_kelly, size_usd: 0.0, reason_tags: tags };
    }

    // Round down to 2 decimals before the daily-cap and dust checks (§4.2).
    size_usd = (size_usd * 100.0).floor() / 100.0;

    if daily_used_usd + size_usd > cfg.daily_bankroll_cap {
        tags.push("daily_cap_exhausted");
        return SizingOutcome { f_kelly, size_usd: 0.0, reason_tags: tags };
    }

    if size_usd < cfg.dust_size_usd {
        return SizingOutcome { f_kelly, size_usd: 0.0, reason_tags: tags };
    }

    SizingOutcome { f_kelly, size_usd, reason_tags: tags }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> TradingConfig {
        TradingConfig {
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

    #[test]
    fn test_acceptance_scenario_size() {
        // edge ~ 0.078, p_market=0.334, kelly_cap=0.10, bankroll=3000 -> size=300.00
        let outcome = size_candidate(0.078, 0.334, &cfg(), 5000.0, 0.0);
        assert!((outcome.size_usd - 300.00).abs() < 0.01, "size was {}", outcome.size_usd);
        assert!(outcome.reason_tags.contains(&"strong_edge"));
        assert!(outcome.reason_tags.contains(&"kelly_capped"));
    }

    #[test]
    fn test_liquidity_rejection_scenario() {
        // p_zeus=0.50, p_market=0.30: f_kelly_raw = 0.20/0.70 = 0.2857 > kelly_cap=0.10,
        // and depth $400 < liquidity_min_usd=1000 -- both tags must survive.
        let edge = 0.50 - 0.30;
        let outcome = size_candidate(edge, 0.30, &cfg(), 400.0, 0.0);
        assert_eq!(outcome.size_usd, 0.0);
        assert!(outcome.reason_tags.contains(&"kelly_capped"));
        assert!(outcome.reason_tags.contains(&"insufficient_liquidity"));
    }

    #[test]
    fn test_daily_cap_exhaustion_scenario() {
        // Ten candidates each sized to $300, daily_bankroll_cap=3000; the 11th is rejected.
        let c = cfg();
        let mut daily_used = 0.0;
        for i in 0..10 {
            let outcome = size_candidate(0.078, 0.334, &c, 5000.0, daily_used);
            assert!(outcome.size_usd > 0.0, "candidate {i} should be accepted");
            daily_used += outcome.size_usd;
        }
        assert!((daily_used - 3000.0).abs() < 0.01);

        let eleventh = size_candidate(0.078, 0.334, &c, 5000.0, daily_used);
        assert_eq!(eleventh.size_usd, 0.0);
        assert!(eleventh.reason_tags.contains(&"daily_cap_exhausted"));
    }

    #[test]
    fn test_per_market_cap_applied() {
        let mut c = cfg();
        c.per_market_cap = 100.0;
        let outcome = size_candidate(0.078, 0.334, &c, 5000.0, 0.0);
        assert!(outcome.size_usd <= 100.0);
        assert!(outcome.reason_tags.contains(&"per_market_capped"));
    }

    #[test]
    fn test_kelly_fraction_never_exceeds_cap() {
        let outcome = size_candidate(0.9, 0.01, &cfg(), 5000.0, 0.0);
        assert!(outcome.f_kelly <= cfg().kelly_cap + 1e-12);
    }
}
