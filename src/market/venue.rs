//! Explicit Venue capability trait (§9 redesign: replaces dynamic
//! duck-typed venue dispatch with a fixed capability set and tagged
//! per-venue implementations).

use crate::errors::EngineResult;
use crate::market::{Bracket, BracketPrice};
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait Venue: Send + Sync {
    /// Lists the bracket set exposed for `(city, event_day)`.
    async fn list_brackets(&self, city: &str, event_day: NaiveDate) -> EngineResult<Vec<Bracket>>;

    /// Fetches current prices for the given market ids.
    async fn prices(&self, bracket_ids: &[String]) -> EngineResult<Vec<(String, BracketPrice)>>;

    /// Whether this venue resolves against whole-degree METAR readings and
    /// therefore requires the Polymarket double-rounding chain (§4.1).
    fn resolves_on_whole_degrees(&self) -> bool;
}
