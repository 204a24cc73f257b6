//! Binance venue adapter
//!
//! REST client against the Binance spot market-data API:
//! - L1 from GET /api/v3/ticker/24hr (bid/ask/last plus close time)
//! - L2 from GET /api/v3/depth (up to 100 levels per side)
//!
//! Public endpoints only; no credentials or request signing.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::adapter::{
    is_usd_quote, liquidity_gradient, quote_metrics, L1Quote, L2Book, VenueAdapter, VenueError,
    DEFAULT_CALL_DEADLINE_MS,
};
use super::guard::must_be_exchange_native;
use crate::orderbook::{BookQuality, PriceLevel};

const VENUE_ID: &str = "binance";

/// Depth levels requested per side
const DEPTH_LIMIT: usize = 100;

/// Binance spot market-data client
pub struct BinanceVenue {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for BinanceVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceVenue")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    bid_price: String,
    bid_qty: String,
    ask_price: String,
    ask_qty: String,
    close_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepthResponse {
    last_update_id: u64,
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

impl BinanceVenue {
    /// Construct against the production endpoint
    pub fn new() -> crate::error::Result<Self> {
        Self::with_base_url("https://api.binance.com")
    }

    /// Construct against a custom endpoint (test servers)
    pub fn with_base_url(base_url: impl Into<String>) -> crate::error::Result<Self> {
        must_be_exchange_native(VENUE_ID)?;

        let client = Client::builder()
            .timeout(Duration::from_millis(DEFAULT_CALL_DEADLINE_MS))
            .user_agent("execgate/0.1.0")
            .build()
            .map_err(|e| crate::error::EngineError::VenueUnavailable {
                venue: VENUE_ID.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn parse_decimal(value: &str, field: &str) -> Result<Decimal, VenueError> {
        Decimal::from_str(value)
            .map_err(|e| VenueError::Transport(format!("invalid {field} '{value}': {e}")))
    }

    fn parse_levels(raw: &[(String, String)], side: &str) -> Result<Vec<PriceLevel>, VenueError> {
        raw.iter()
            .map(|(price, qty)| {
                Ok(PriceLevel::new(
                    Self::parse_decimal(price, &format!("{side} price"))?,
                    Self::parse_decimal(qty, &format!("{side} qty"))?,
                ))
            })
            .collect()
    }
}

/// Quality tag from ladder sizes: a venue that returns thin ladders is
/// serving a partial or degraded view of its book
fn classify_quality(bid_levels: usize, ask_levels: usize) -> BookQuality {
    let min_side = bid_levels.min(ask_levels);
    if min_side >= 20 {
        BookQuality::Full
    } else if min_side >= 5 {
        BookQuality::Partial
    } else {
        BookQuality::Degraded
    }
}

#[async_trait]
impl VenueAdapter for BinanceVenue {
    fn venue(&self) -> &str {
        VENUE_ID
    }

    async fn get_l1(&self, symbol: &str) -> Result<L1Quote, VenueError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/api/v3/ticker/24hr?symbol={}", self.base_url, symbol);

        let ticker: Ticker24h = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(VenueError::from)?
            .json()
            .await?;

        let bid_price = Self::parse_decimal(&ticker.bid_price, "bid price")?;
        let ask_price = Self::parse_decimal(&ticker.ask_price, "ask price")?;
        let (spread_bps, mid) = quote_metrics(
            bid_price.to_f64().unwrap_or(0.0),
            ask_price.to_f64().unwrap_or(0.0),
        )
        .ok_or_else(|| VenueError::EmptyBook(symbol.clone()))?;

        let data_age_ms = (Utc::now().timestamp_millis() - ticker.close_time).max(0);
        debug!(venue = VENUE_ID, symbol = %symbol, spread_bps, data_age_ms, "fetched L1");

        Ok(L1Quote {
            venue: VENUE_ID.to_string(),
            symbol: symbol.clone(),
            bid_price,
            bid_size: Self::parse_decimal(&ticker.bid_qty, "bid qty")?,
            ask_price,
            ask_size: Self::parse_decimal(&ticker.ask_qty, "ask qty")?,
            last_price: Self::parse_decimal(&ticker.last_price, "last price")?,
            spread_bps,
            mid,
            quality: BookQuality::Full,
            data_age_ms,
            usd_quote: is_usd_quote(&symbol),
        })
    }

    async fn get_l2(&self, symbol: &str) -> Result<L2Book, VenueError> {
        let symbol = symbol.to_uppercase();
        let url = format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            self.base_url, symbol, DEPTH_LIMIT
        );

        let depth: DepthResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(VenueError::from)?
            .json()
            .await?;

        if depth.bids.is_empty() || depth.asks.is_empty() {
            return Err(VenueError::EmptyBook(symbol));
        }

        let bids = Self::parse_levels(&depth.bids, "bid")?;
        let asks = Self::parse_levels(&depth.asks, "ask")?;

        let total_depth_usd: f64 = bids
            .iter()
            .chain(asks.iter())
            .filter_map(|l| l.notional().to_f64())
            .sum();

        debug!(
            venue = VENUE_ID,
            symbol = %symbol,
            bid_levels = bids.len(),
            ask_levels = asks.len(),
            "fetched L2"
        );

        Ok(L2Book {
            venue: VENUE_ID.to_string(),
            symbol: symbol.clone(),
            total_depth_usd,
            bid_levels: bids.len(),
            ask_levels: asks.len(),
            liquidity_gradient: liquidity_gradient(&bids, &asks),
            quality: classify_quality(bids.len(), asks.len()),
            usd_quote: is_usd_quote(&symbol),
            sequence: depth.last_update_id,
            bids,
            asks,
        })
    }
}
