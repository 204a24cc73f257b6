//! OKX venue adapter
//!
//! REST client against the OKX v5 market-data API:
//! - L1 from GET /api/v5/market/ticker
//! - L2 from GET /api/v5/market/books (up to 100 levels per side)

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

const VENUE_ID: &str = "okx";

const DEPTH_LIMIT: usize = 100;

/// OKX v5 market-data client
pub struct OkxVenue {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for OkxVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OkxVenue")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct OkxEnvelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OkxTicker {
    last: String,
    #[serde(rename = "bidPx")]
    bid_px: String,
    #[serde(rename = "bidSz")]
    bid_sz: String,
    #[serde(rename = "askPx")]
    ask_px: String,
    #[serde(rename = "askSz")]
    ask_sz: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct OkxBook {
    bids: Vec<Vec<String>>,
    asks: Vec<Vec<String>>,
    ts: String,
}

/// "BTCUSDT" -> "BTC-USDT"; hyphenated input passes through
fn inst_id(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    if upper.contains('-') {
        return upper;
    }
    for quote in ["USDT", "USDC", "USD"] {
        if let Some(base) = upper.strip_suffix(quote) {
            if !base.is_empty() {
                return format!("{base}-{quote}");
            }
        }
    }
    upper
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

impl OkxVenue {
    pub fn new() -> crate::error::Result<Self> {
        Self::with_base_url("https://www.okx.com")
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
        let envelope: OkxEnvelope<T> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(VenueError::from)?
            .json()
            .await?;

        if envelope.code != "0" {
            return Err(VenueError::Transport(format!(
                "okx error {}: {}",
                envelope.code, envelope.msg
            )));
        }
        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| VenueError::EmptyBook("empty okx response".to_string()))
    }

    fn parse_decimal(value: &str, field: &str) -> Result<Decimal, VenueError> {
        Decimal::from_str(value)
            .map_err(|e| VenueError::Transport(format!("invalid {field} '{value}': {e}")))
    }

    /// OKX ladders are `[price, size, liquidated_orders, order_count]`
    fn parse_levels(raw: &[Vec<String>], side: &str) -> Result<Vec<PriceLevel>, VenueError> {
        raw.iter()
            .map(|entry| {
                let price = entry
                    .first()
                    .ok_or_else(|| VenueError::Transport(format!("short {side} entry")))?;
                let size = entry
                    .get(1)
                    .ok_or_else(|| VenueError::Transport(format!("short {side} entry")))?;
                Ok(PriceLevel::new(
                    Self::parse_decimal(price, &format!("{side} price"))?,
                    Self::parse_decimal(size, &format!("{side} size"))?,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl VenueAdapter for OkxVenue {
    fn venue(&self) -> &str {
        VENUE_ID
    }

    async fn get_l1(&self, symbol: &str) -> Result<L1Quote, VenueError> {
        let inst = inst_id(symbol);
        let url = format!("{}/api/v5/market/ticker?instId={}", self.base_url, inst);
        let ticker: OkxTicker = self.fetch(&url).await?;

        let bid_price = Self::parse_decimal(&ticker.bid_px, "bid price")?;
        let ask_price = Self::parse_decimal(&ticker.ask_px, "ask price")?;
        let (spread_bps, mid) = quote_metrics(
            bid_price.to_f64().unwrap_or(0.0),
            ask_price.to_f64().unwrap_or(0.0),
        )
        .ok_or_else(|| VenueError::EmptyBook(inst.clone()))?;

        let ts: i64 = ticker.ts.parse().unwrap_or(0);
        let data_age_ms = if ts > 0 {
            (Utc::now().timestamp_millis() - ts).max(0)
        } else {
            0
        };
        debug!(venue = VENUE_ID, symbol = %inst, spread_bps, data_age_ms, "fetched L1");

        Ok(L1Quote {
            venue: VENUE_ID.to_string(),
            symbol: symbol.to_uppercase(),
            bid_price,
            bid_size: Self::parse_decimal(&ticker.bid_sz, "bid size")?,
            ask_price,
            ask_size: Self::parse_decimal(&ticker.ask_sz, "ask size")?,
            last_price: Self::parse_decimal(&ticker.last, "last price")?,
            spread_bps,
            mid,
            quality: BookQuality::Full,
            data_age_ms,
            usd_quote: is_usd_quote(&inst),
        })
    }

    async fn get_l2(&self, symbol: &str) -> Result<L2Book, VenueError> {
        let inst = inst_id(symbol);
        let url = format!(
            "{}/api/v5/market/books?instId={}&sz={}",
            self.base_url, inst, DEPTH_LIMIT
        );
        let book: OkxBook = self.fetch(&url).await?;

        if book.bids.is_empty() || book.asks.is_empty() {
            return Err(VenueError::EmptyBook(inst));
        }

        let bids = Self::parse_levels(&book.bids, "bid")?;
        let asks = Self::parse_levels(&book.asks, "ask")?;

        let total_depth_usd: f64 = bids
            .iter()
            .chain(asks.iter())
            .filter_map(|l| l.notional().to_f64())
            .sum();

        debug!(
            venue = VENUE_ID,
            symbol = %inst,
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
            usd_quote: is_usd_quote(&inst),
            sequence: book.ts.parse().unwrap_or(0),
            bids,
            asks,
        })
    }
}
