//! Market Client (C4): discovers daily bracket markets and fetches prices.
//! Shares the retry/backoff contract with the Forecast Client (§4.3).

use crate::errors::{EngineError, EngineResult};
use crate::market::venue::Venue;
use crate::market::{parse_bracket_name, validate_partition, Bracket, BracketPrice};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct MarketListing {
    market_id: String,
    bracket_name: String,
}

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    markets: Vec<MarketListing>,
}

#[derive(Debug, Deserialize)]
struct PriceQuote {
    market_id: String,
    mid_prob: f64,
    best_bid: f64,
    best_ask: f64,
    available_usd_at_top_of_book: f64,
}

#[derive(Debug, Deserialize)]
struct PricesResponse {
    prices: Vec<PriceQuote>,
}

/// A read-only, unauthenticated market data client for one venue.
pub struct MarketClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    per_call_timeout: Duration,
    resolves_on_whole_degrees: bool,
}

impl MarketClient {
    pub fn new(base_url: &str, max_retries: u32, per_call_timeout: Duration, resolves_on_whole_degrees: bool) -> Self {
        Self {
            client: Client::builder().timeout(per_call_timeout).build().unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            per_call_timeout,
            resolves_on_whole_degrees,
        }
    }

    async fn get_with_retry<T: serde::de::DeserializeOwned>(&self, path: &str) -> EngineResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let resp = self.client.get(&url).send().await;

            match resp {
                Ok(r) => {
                    let status = r.status();
                    if status.is_success() {
                        return r.json::<T>().await.map_err(|e| EngineError::InvalidResponse(e.to_string()));
                    }
                    if !status.is_server_error() && status.as_u16() != 429 {
                        let body = r.text().await.unwrap_or_default();
                        return Err(EngineError::InvalidResponse(format!("HTTP {status}: {body}")));
                    }
                    // 5xx / 429: transient, fall through to backoff below.
                }
                Err(_) => {
                    // network error: transient, fall through to backoff below.
                }
            }

            attempt += 1;
            if attempt > self.max_retries {
                return Err(EngineError::TransientFetch(format!("exhausted retries for {path}")));
            }
            let backoff_ms = std::cmp::min(attempt * attempt * 200, 5_000);
            let jitter = 0.5 + rand::random::<f64>() * 0.5;
            tokio::time::sleep(Duration::from_millis((backoff_ms as f64 * jitter) as u64)).await;
        }
    }
}

#[async_trait]
impl Venue for MarketClient {
    async fn list_brackets(&self, city: &str, event_day: NaiveDate) -> EngineResult<Vec<Bracket>> {
        let path = format!("/markets?city={city}&event_day={event_day}");
        let resp: MarketsResponse = self.get_with_retry(&path).await?;

        // Dedup by market_id, last write wins within the response (§4.3).
        let mut by_id: HashMap<String, Bracket> = HashMap::new();
        for listing in resp.markets {
            let (lower_f, upper_f, is_under, is_over) = parse_bracket_name(&listing.bracket_name)?;
            by_id.insert(
                listing.market_id.clone(),
                Bracket { market_id: listing.market_id, lower_f, upper_f, is_under, is_over },
            );
        }

        let brackets: Vec<Bracket> = by_id.into_values().collect();
        validate_partition(&brackets)?;
        Ok(brackets)
    }

    async fn prices(&self, bracket_ids: &[String]) -> EngineResult<Vec<(String, BracketPrice)>> {
        let ids = bracket_ids.join(",");
        let path = format!("/prices?market_ids={ids}");
        let resp: PricesResponse = self.get_with_retry(&path).await?;
        let fetched_at_utc = Utc::now();

        Ok(resp
            .prices
            .into_iter()
            .map(|q| {
                (
                    q.market_id,
                    BracketPrice {
                        mid_prob: q.mid_prob,
                        best_bid: q.best_bid,
                        best_ask: q.best_ask,
                        available_usd_at_top_of_book: q.available_usd_at_top_of_book,
                        fetched_at_utc,
                    },
                )
            })
            .collect())
    }

    #[inline]
    fn resolves_on_whole_degrees(&self) -> bool {
        self.resolves_on_whole_degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let c = MarketClient::new("https://example.com", 3, Duration::from_secs(5), true);
        assert!(c.resolves_on_whole_degrees());
    }
}
