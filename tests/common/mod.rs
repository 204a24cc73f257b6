//! Shared test fixtures: a scripted venue adapter and book builders

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use execgate::orderbook::{BookQuality, PriceLevel};
use execgate::venue::guard::must_be_exchange_native;
use execgate::venue::{L1Quote, L2Book, VenueAdapter, VenueError};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).expect("finite test value")
}

/// Parameters for a synthetic order book
///
/// Ladders start at the touch and step away by `last / 10_000` per level,
/// so every level sits comfortably inside the ±2% depth band.
#[derive(Debug, Clone, Copy)]
pub struct MockBook {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub levels: usize,
    pub size_per_level: f64,
    pub quality: BookQuality,
    pub data_age_ms: i64,
}

impl MockBook {
    /// A symmetric book around `last` with the given spread
    pub fn tight(last: f64, spread_bps: f64, size_per_level: f64) -> Self {
        let half = last * spread_bps / 10_000.0 / 2.0;
        Self {
            bid: last - half,
            ask: last + half,
            last,
            levels: 5,
            size_per_level,
            quality: BookQuality::Full,
            data_age_ms: 0,
        }
    }

    /// A crossed book (bid above ask) that no calculator accepts
    pub fn crossed(last: f64) -> Self {
        Self {
            bid: last * 1.002,
            ask: last * 0.998,
            last,
            levels: 5,
            size_per_level: 1.0,
            quality: BookQuality::Full,
            data_age_ms: 0,
        }
    }

    pub fn with_quality(mut self, quality: BookQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_age_ms(mut self, age_ms: i64) -> Self {
        self.data_age_ms = age_ms;
        self
    }
}

#[derive(Debug)]
enum Script {
    Respond(MockBook),
    Fail(String),
    Slow(MockBook, Duration),
}

/// Scripted venue adapter for evaluator scenarios
#[derive(Debug)]
pub struct MockVenue {
    id: String,
    script: Script,
}

impl MockVenue {
    /// Construction path that enforces the exchange-native assertion, the
    /// way the real adapters do
    pub fn try_new(id: &str, book: MockBook) -> execgate::Result<Self> {
        must_be_exchange_native(id)?;
        Ok(Self {
            id: id.to_lowercase(),
            script: Script::Respond(book),
        })
    }

    /// A venue that always answers with the given book (no guard check;
    /// used to exercise the evaluator's own provenance enforcement)
    pub fn healthy(id: &str, book: MockBook) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_lowercase(),
            script: Script::Respond(book),
        })
    }

    /// A venue whose every call fails with a transport error
    pub fn failing(id: &str, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_lowercase(),
            script: Script::Fail(reason.to_string()),
        })
    }

    /// A venue that sleeps before answering
    pub fn slow(id: &str, book: MockBook, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_lowercase(),
            script: Script::Slow(book, delay),
        })
    }

    async fn book(&self) -> Result<MockBook, VenueError> {
        match &self.script {
            Script::Respond(book) => Ok(*book),
            Script::Fail(reason) => Err(VenueError::Transport(reason.clone())),
            Script::Slow(book, delay) => {
                tokio::time::sleep(*delay).await;
                Ok(*book)
            }
        }
    }
}

#[async_trait]
impl VenueAdapter for MockVenue {
    fn venue(&self) -> &str {
        &self.id
    }

    async fn get_l1(&self, symbol: &str) -> Result<L1Quote, VenueError> {
        let book = self.book().await?;
        let mid = (book.bid + book.ask) / 2.0;
        Ok(L1Quote {
            venue: self.id.clone(),
            symbol: symbol.to_uppercase(),
            bid_price: dec(book.bid),
            bid_size: dec(book.size_per_level),
            ask_price: dec(book.ask),
            ask_size: dec(book.size_per_level),
            last_price: dec(book.last),
            spread_bps: (book.ask - book.bid) / mid * 10_000.0,
            mid,
            quality: book.quality,
            data_age_ms: book.data_age_ms,
            usd_quote: true,
        })
    }

    async fn get_l2(&self, symbol: &str) -> Result<L2Book, VenueError> {
        let book = self.book().await?;
        let step = book.last / 10_000.0;

        let bids: Vec<PriceLevel> = (0..book.levels)
            .map(|i| dec(book.bid - step * i as f64))
            .map(|price| PriceLevel::new(price, dec(book.size_per_level)))
            .collect();
        let asks: Vec<PriceLevel> = (0..book.levels)
            .map(|i| dec(book.ask + step * i as f64))
            .map(|price| PriceLevel::new(price, dec(book.size_per_level)))
            .collect();

        let total_depth_usd: f64 = bids
            .iter()
            .chain(asks.iter())
            .map(|l| {
                use rust_decimal::prelude::ToPrimitive;
                l.notional().to_f64().unwrap_or(0.0)
            })
            .sum();

        Ok(L2Book {
            venue: self.id.clone(),
            symbol: symbol.to_uppercase(),
            total_depth_usd,
            bid_levels: bids.len(),
            ask_levels: asks.len(),
            liquidity_gradient: 0.2,
            quality: book.quality,
            usd_quote: true,
            sequence: 42,
            bids,
            asks,
        })
    }
}
