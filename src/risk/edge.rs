//! Edge computation (C7, first half): edge net of fees and slippage.
//!
//! `edge = p_zeus - p_market - fee_bp*1e-4 - slippage_bp*1e-4`
//!
//! Pure function, no side effects, no allocations.

/// Parameters for edge computation. Stack-allocated.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct EdgeParams {
    pub p_zeus: f64,
    pub p_market: f64,
    pub fee_bp: f64,
    pub slippage_bp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeOutcome {
    Ok(f64),
    BelowEdgeMin,
    DegenerateProb,
}

/// Computes edge and applies the degenerate-price and below-edge-min gates
/// (§4.2). `eps` bounds `p_market` away from 0 and 1.
#[inline]
pub fn compute_edge(params: &EdgeParams, edge_min: f64, eps: f64) -> EdgeOutcome {
    if !(params.p_market > eps && params.p_market < 1.0 - eps) {
        return EdgeOutcome::DegenerateProb;
    }

    let edge = params.p_zeus - params.p_market - params.fee_bp * 1e-4 - params.slippage_bp * 1e-4;

    if edge < edge_min {
        return EdgeOutcome::BelowEdgeMin;
    }

    EdgeOutcome::Ok(edge)
}

/// Raw edge value without gating, for property tests and diagnostics.
#[inline]
pub fn raw_edge(params: &EdgeParams) -> f64 {
    params.p_zeus - params.p_market - params.fee_bp * 1e-4 - params.slippage_bp * 1e-4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptance_scenario_edge() {
        // Seed scenario: p_zeus=0.420, p_market=0.334, fee_bp=50, slippage_bp=30 -> edge ~ 0.078
        let params = EdgeParams { p_zeus: 0.420, p_market: 0.334, fee_bp: 50.0, slippage_bp: 30.0 };
        let edge = raw_edge(&params);
        assert!((edge - 0.078).abs() < 0.001, "edge was {edge}");
    }

    #[test]
    fn test_below_edge_rejection_scenario() {
        let params = EdgeParams { p_zeus: 0.34, p_market: 0.334, fee_bp: 50.0, slippage_bp: 30.0 };
        let edge = raw_edge(&params);
        assert!((edge - (-0.002)).abs() < 1e-6, "edge was {edge}");
        let outcome = compute_edge(&params, 0.05, 1e-6);
        assert_eq!(outcome, EdgeOutcome::BelowEdgeMin);
    }

    #[test]
    fn test_degenerate_price_rejected() {
        let params = EdgeParams { p_zeus: 0.9, p_market: 0.0, fee_bp: 0.0, slippage_bp: 0.0 };
        assert_eq!(compute_edge(&params, 0.0, 1e-6), EdgeOutcome::DegenerateProb);
    }

    #[test]
    fn test_edge_monotone_in_p_zeus() {
        let a = raw_edge(&EdgeParams { p_zeus: 0.4, p_market: 0.3, fee_bp: 0.0, slippage_bp: 0.0 });
        let b = raw_edge(&EdgeParams { p_zeus: 0.5, p_market: 0.3, fee_bp: 0.0, slippage_bp: 0.0 });
        assert!(b > a);
    }

    #[test]
    fn test_edge_monotone_decreasing_in_p_market_and_costs() {
        let base = raw_edge(&EdgeParams { p_zeus: 0.5, p_market: 0.3, fee_bp: 0.0, slippage_bp: 0.0 });
        let higher_market = raw_edge(&EdgeParams { p_zeus: 0.5, p_market: 0.35, fee_bp: 0.0, slippage_bp: 0.0 });
        let higher_costs = raw_edge(&EdgeParams { p_zeus: 0.5, p_market: 0.3, fee_bp: 10.0, slippage_bp: 10.0 });
        assert!(higher_market < base);
        assert!(higher_costs < base);
    }
}
