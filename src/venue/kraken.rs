//! Kraken venue adapter
//!
//! REST client against the Kraken public market-data API:
//! - L1 from GET /0/public/Ticker
//! - L2 from GET /0/public/Depth (up to 100 levels per side)
//!
//! Kraken spells Bitcoin "XBT" and keys its responses by its own internal
//! pair names, so the adapter maps symbols on the way in and takes the
//! first result entry on the way out.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
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

const VENUE_ID: &str = "kraken";

const DEPTH_LIMIT: usize = 100;

/// Kraken public market-data client
pub struct KrakenVenue {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for KrakenVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenVenue")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct KrakenEnvelope<T> {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<HashMap<String, T>>,
}

#[derive(Debug, Deserialize)]
struct KrakenTicker {
    /// ask: [price, whole lot volume, lot volume]
    a: Vec<String>,
    /// bid: [price, whole lot volume, lot volume]
    b: Vec<String>,
    /// last trade: [price, lot volume]
    c: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KrakenDepth {
    /// [price, volume, timestamp]
    bids: Vec<(String, String, i64)>,
    asks: Vec<(String, String, i64)>,
}

/// "BTCUSD" -> "XBTUSD"; hyphens dropped, BTC respelled
fn pair_for(symbol: &str) -> String {
    let compact: String = symbol
        .to_uppercase()
        .chars()
        .filter(|c| *c != '-')
        .collect();
    if let Some(rest) = compact.strip_prefix("BTC") {
        format!("XBT{rest}")
    } else {
        compact
    }
}

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

impl KrakenVenue {
    pub fn new() -> crate::error::Result<Self> {
        Self::with_base_url("https://api.kraken.com")
    }

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

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, VenueError> {
        let envelope: KrakenEnvelope<T> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(VenueError::from)?
            .json()
            .await?;

        if !envelope.error.is_empty() {
            let joined = envelope.error.join("; ");
            if joined.contains("Rate limit") {
                return Err(VenueError::RateLimited(joined));
            }
            return Err(VenueError::Transport(format!("kraken error: {joined}")));
        }
        envelope
            .result
            .and_then(|map| map.into_values().next())
            .ok_or_else(|| VenueError::EmptyBook("empty kraken result".to_string()))
    }

    fn parse_decimal(value: &str, field: &str) -> Result<Decimal, VenueError> {
        Decimal::from_str(value)
            .map_err(|e| VenueError::Transport(format!("invalid {field} '{value}': {e}")))
    }

    fn first<'a>(values: &'a [String], field: &str) -> Result<&'a str, VenueError> {
        values
            .first()
            .map(String::as_str)
            .ok_or_else(|| VenueError::Transport(format!("missing {field}")))
    }
}

#[async_trait]
impl VenueAdapter for KrakenVenue {
    fn venue(&self) -> &str {
        VENUE_ID
    }

    async fn get_l1(&self, symbol: &str) -> Result<L1Quote, VenueError> {
        let pair = pair_for(symbol);
        let url = format!("{}/0/public/Ticker?pair={}", self.base_url, pair);
        let ticker: KrakenTicker = self.fetch(&url).await?;

        let bid_price = Self::parse_decimal(Self::first(&ticker.b, "bid")?, "bid price")?;
        let ask_price = Self::parse_decimal(Self::first(&ticker.a, "ask")?, "ask price")?;
        let bid_size = ticker
            .b
            .get(2)
            .map(|v| Self::parse_decimal(v, "bid size"))
            .transpose()?
            .unwrap_or(Decimal::ZERO);
        let ask_size = ticker
            .a
            .get(2)
            .map(|v| Self::parse_decimal(v, "ask size"))
            .transpose()?
            .unwrap_or(Decimal::ZERO);

        let (spread_bps, mid) = quote_metrics(
            bid_price.to_f64().unwrap_or(0.0),
            ask_price.to_f64().unwrap_or(0.0),
        )
        .ok_or_else(|| VenueError::EmptyBook(pair.clone()))?;

        debug!(venue = VENUE_ID, symbol = %pair, spread_bps, "fetched L1");

        Ok(L1Quote {
            venue: VENUE_ID.to_string(),
            symbol: symbol.to_uppercase(),
            bid_price,
            bid_size,
            ask_price,
            ask_size,
            last_price: Self::parse_decimal(Self::first(&ticker.c, "last")?, "last price")?,
            spread_bps,
            mid,
            quality: BookQuality::Full,
            // the ticker carries no event time; treat as fresh on arrival
            data_age_ms: 0,
            usd_quote: is_usd_quote(symbol),
        })
    }

    async fn get_l2(&self, symbol: &str) -> Result<L2Book, VenueError> {
        let pair = pair_for(symbol);
        let url = format!(
            "{}/0/public/Depth?pair={}&count={}",
            self.base_url, pair, DEPTH_LIMIT
        );
        let depth: KrakenDepth = self.fetch(&url).await?;

        if depth.bids.is_empty() || depth.asks.is_empty() {
            return Err(VenueError::EmptyBook(pair));
        }

        let parse_side = |raw: &[(String, String, i64)],
                          side: &str|
         -> Result<Vec<PriceLevel>, VenueError> {
            raw.iter()
                .map(|(price, volume, _)| {
                    Ok(PriceLevel::new(
                        Self::parse_decimal(price, &format!("{side} price"))?,
                        Self::parse_decimal(volume, &format!("{side} volume"))?,
                    ))
                })
                .collect()
        };
        let bids = parse_side(&depth.bids, "bid")?;
        let asks = parse_side(&depth.asks, "ask")?;

        let total_depth_usd: f64 = bids
            .iter()
            .chain(asks.iter())
            .filter_map(|l| l.notional().to_f64())
            .sum();

        // newest level timestamp doubles as the ladder sequence
        let sequence = depth
            .bids
            .iter()
            .chain(depth.asks.iter())
            .map(|(_, _, ts)| *ts)
            .max()
            .unwrap_or(0) as u64;

        debug!(
            venue = VENUE_ID,
            symbol = %pair,
            bid_levels = bids.len(),
            ask_levels = asks.len(),
            "fetched L2"
        );

        Ok(L2Book {
            venue: VENUE_ID.to_string(),
            symbol: symbol.to_uppercase(),
            total_depth_usd,
            bid_levels: bids.len(),
            ask_levels: asks.len(),
            liquidity_gradient: liquidity_gradient(&bids, &asks),
            quality: classify_quality(bids.len(), asks.len()),
            usd_quote: is_usd_quote(symbol),
            sequence,
            bids,
            asks,
        })
    }
}
