//! Coinbase venue adapter
//!
//! REST client against the Coinbase Exchange market-data API:
//! - L1 from GET /products/{id}/ticker plus GET /products/{id}/book?level=1
//!   (the ticker carries the last trade, the level-1 book the touch sizes)
//! - L2 from GET /products/{id}/book?level=2 (up to 50 levels per side)

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
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

const VENUE_ID: &str = "coinbase";

/// Coinbase Exchange market-data client
pub struct CoinbaseVenue {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for CoinbaseVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseVenue")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CoinbaseTicker {
    price: String,
    time: String,
}

/// Book levels arrive as `[price, size, num_orders]` with a numeric tail
#[derive(Debug, Deserialize)]
struct CoinbaseBook {
    sequence: u64,
    bids: Vec<(String, String, serde_json::Value)>,
    asks: Vec<(String, String, serde_json::Value)>,
}

/// "BTCUSD" -> "BTC-USD"; hyphenated input passes through
fn product_id(symbol: &str) -> String {
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

impl CoinbaseVenue {
    pub fn new() -> crate::error::Result<Self> {
        Self::with_base_url("https://api.exchange.coinbase.com")
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
        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(VenueError::from)?
            .json()
            .await?)
    }

    fn parse_decimal(value: &str, field: &str) -> Result<Decimal, VenueError> {
        Decimal::from_str(value)
            .map_err(|e| VenueError::Transport(format!("invalid {field} '{value}': {e}")))
    }

    fn parse_levels(
        raw: &[(String, String, serde_json::Value)],
        side: &str,
    ) -> Result<Vec<PriceLevel>, VenueError> {
        raw.iter()
            .map(|(price, size, _)| {
                Ok(PriceLevel::new(
                    Self::parse_decimal(price, &format!("{side} price"))?,
                    Self::parse_decimal(size, &format!("{side} size"))?,
                ))
            })
            .collect()
    }

    async fn book(&self, product: &str, level: u8) -> Result<CoinbaseBook, VenueError> {
        let url = format!("{}/products/{}/book?level={}", self.base_url, product, level);
        let book: CoinbaseBook = self.fetch(&url).await?;
        if book.bids.is_empty() || book.asks.is_empty() {
            return Err(VenueError::EmptyBook(product.to_string()));
        }
        Ok(book)
    }
}

#[async_trait]
impl VenueAdapter for CoinbaseVenue {
    fn venue(&self) -> &str {
        VENUE_ID
    }

    async fn get_l1(&self, symbol: &str) -> Result<L1Quote, VenueError> {
        let product = product_id(symbol);

        let ticker_url = format!("{}/products/{}/ticker", self.base_url, product);
        let ticker: CoinbaseTicker = self.fetch(&ticker_url).await?;
        let book = self.book(&product, 1).await?;

        let (bid_price, bid_size) = {
            let (price, size, _) = &book.bids[0];
            (
                Self::parse_decimal(price, "bid price")?,
                Self::parse_decimal(size, "bid size")?,
            )
        };
        let (ask_price, ask_size) = {
            let (price, size, _) = &book.asks[0];
            (
                Self::parse_decimal(price, "ask price")?,
                Self::parse_decimal(size, "ask size")?,
            )
        };

        let (spread_bps, mid) = quote_metrics(
            bid_price.to_f64().unwrap_or(0.0),
            ask_price.to_f64().unwrap_or(0.0),
        )
        .ok_or_else(|| VenueError::EmptyBook(product.clone()))?;

        let data_age_ms = DateTime::parse_from_rfc3339(&ticker.time)
            .map(|t| (Utc::now().timestamp_millis() - t.timestamp_millis()).max(0))
            .unwrap_or(0);
        debug!(venue = VENUE_ID, symbol = %product, spread_bps, data_age_ms, "fetched L1");

        Ok(L1Quote {
            venue: VENUE_ID.to_string(),
            symbol: symbol.to_uppercase(),
            bid_price,
            bid_size,
            ask_price,
            ask_size,
            last_price: Self::parse_decimal(&ticker.price, "last price")?,
            spread_bps,
            mid,
            quality: BookQuality::Full,
            data_age_ms,
            usd_quote: is_usd_quote(&product),
        })
    }

    async fn get_l2(&self, symbol: &str) -> Result<L2Book, VenueError> {
        let product = product_id(symbol);
        let book = self.book(&product, 2).await?;

        let bids = Self::parse_levels(&book.bids, "bid")?;
        let asks = Self::parse_levels(&book.asks, "ask")?;

        let total_depth_usd: f64 = bids
            .iter()
            .chain(asks.iter())
            .filter_map(|l| l.notional().to_f64())
            .sum();

        debug!(
            venue = VENUE_ID,
            symbol = %product,
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
            usd_quote: is_usd_quote(&product),
            sequence: book.sequence,
            bids,
            asks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_mapping() {
        assert_eq!(product_id("BTCUSD"), "BTC-USD");
        assert_eq!(product_id("ethusdt"), "ETH-USDT");
        assert_eq!(product_id("SOL-USD"), "SOL-USD");
    }

    #[test]
    fn test_book_parsing_with_numeric_tail() {
        let raw = r#"{
            "sequence": 4753223,
            "bids": [["49990.00", "1.5", 3]],
            "asks": [["50010.00", "1.0", 1]]
        }"#;
        let book: CoinbaseBook = serde_json::from_str(raw).unwrap();
        assert_eq!(book.sequence, 4753223);
        let bids = CoinbaseVenue::parse_levels(&book.bids, "bid").unwrap();
        assert_eq!(bids[0].size.to_string(), "1.5");
    }
}
