pub mod calibration;
pub mod mapper;

use crate::market::Bracket;

/// Output of the Probability Mapper for one bracket (§3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct BracketProb {
    pub bracket: Bracket,
    pub p_zeus: f64,
    pub sigma_used: f64,
}
