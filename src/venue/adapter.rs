//! Venue adapter contract
//!
//! The port every exchange integration implements: L1 best bid/ask and L2
//! depth, each with source attribution and a USD-quote flag. Calls must
//! return within the configured deadline or fail with a transport error.

use async_trait::async_trait;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orderbook::{BookQuality, PriceLevel};

/// Default per-call deadline for adapter requests
pub const DEFAULT_CALL_DEADLINE_MS: u64 = 2000;

/// Adapter failure kinds
#[derive(Debug, Error)]
pub enum VenueError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("stale data: age {age_ms}ms exceeds cap {cap_ms}ms")]
    StaleData { age_ms: i64, cap_ms: i64 },

    #[error("empty book for {0}")]
    EmptyBook(String),

    #[error("non-USD quote for {0}")]
    NonUsdQuote(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("circuit open: {0}")]
    CircuitOpen(String),
}

impl VenueError {
    /// Stable code recorded in health logs and failure reasons
    pub fn code(&self) -> &'static str {
        match self {
            VenueError::Transport(_) => "transport_error",
            VenueError::StaleData { .. } => "stale_data",
            VenueError::EmptyBook(_) => "empty_book",
            VenueError::NonUsdQuote(_) => "non_usd_quote",
            VenueError::RateLimited(_) => "rate_limited",
            VenueError::CircuitOpen(_) => "circuit_open",
        }
    }
}

impl From<reqwest::Error> for VenueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return VenueError::Transport("request timeout".to_string());
        }
        if err.is_connect() {
            return VenueError::Transport(format!("connect failed: {}", err));
        }
        if let Some(status) = err.status() {
            return match status.as_u16() {
                429 => VenueError::RateLimited(format!("HTTP 429: {}", err)),
                418 | 403 => VenueError::CircuitOpen(format!("HTTP {}: {}", status, err)),
                _ => VenueError::Transport(format!("HTTP {}: {}", status, err)),
            };
        }
        VenueError::Transport(err.to_string())
    }
}

/// L1 best bid/ask quote with derived spread and mid
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct L1Quote {
    /// Venue identifier (lowercase)
    pub venue: String,

    /// Trading pair symbol (uppercase)
    pub symbol: String,

    #[schemars(with = "String")]
    pub bid_price: Decimal,

    #[schemars(with = "String")]
    pub bid_size: Decimal,

    #[schemars(with = "String")]
    pub ask_price: Decimal,

    #[schemars(with = "String")]
    pub ask_size: Decimal,

    /// Last trade price
    #[schemars(with = "String")]
    pub last_price: Decimal,

    /// Spread in basis points: (ask - bid) / mid * 10_000
    pub spread_bps: f64,

    /// Mid price between best bid and ask
    pub mid: f64,

    /// Book-quality tag from the venue
    pub quality: BookQuality,

    /// Milliseconds since the venue produced this quote
    pub data_age_ms: i64,

    /// True when the pair is quoted in USD or a USD stablecoin
    pub usd_quote: bool,
}

/// L2 depth ladder with aggregate notional
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct L2Book {
    /// Venue identifier (lowercase)
    pub venue: String,

    /// Trading pair symbol (uppercase)
    pub symbol: String,

    /// Bid levels, descending price
    pub bids: Vec<PriceLevel>,

    /// Ask levels, ascending price
    pub asks: Vec<PriceLevel>,

    /// Total notional across both ladders, USD
    pub total_depth_usd: f64,

    /// Number of bid levels returned
    pub bid_levels: usize,

    /// Number of ask levels returned
    pub ask_levels: usize,

    /// Notional falloff per level away from the touch (0..1, higher = flatter)
    pub liquidity_gradient: f64,

    /// Book-quality tag from the venue
    pub quality: BookQuality,

    /// True when the pair is quoted in USD or a USD stablecoin
    pub usd_quote: bool,

    /// Exchange sequence / update id for the ladder
    pub sequence: u64,
}

/// Port implemented by every exchange integration
///
/// Implementations are `Send + Sync` and shared across concurrent
/// evaluations behind `Arc`. Both calls observe the adapter's configured
/// deadline and surface `VenueError::Transport` on expiry.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Lowercase venue identifier, always a member of the allowlist
    fn venue(&self) -> &str;

    /// Fetch best bid/ask for `symbol`
    async fn get_l1(&self, symbol: &str) -> Result<L1Quote, VenueError>;

    /// Fetch the depth ladder for `symbol`
    async fn get_l2(&self, symbol: &str) -> Result<L2Book, VenueError>;
}

/// Spread (bps) and mid from raw bid/ask; `None` on non-positive prices
///
/// Crossed quotes pass through with a negative spread: the calculators,
/// not the adapters, decide that a crossed book fails the evaluation.
pub(crate) fn quote_metrics(bid: f64, ask: f64) -> Option<(f64, f64)> {
    if bid <= 0.0 || ask <= 0.0 {
        return None;
    }
    let mid = (bid + ask) / 2.0;
    Some(((ask - bid) / mid * 10_000.0, mid))
}

/// True for USD and USD-stablecoin quote currencies
pub(crate) fn is_usd_quote(symbol: &str) -> bool {
    let upper = symbol.to_uppercase();
    let compact: String = upper.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    ["USDT", "USDC", "USD"]
        .iter()
        .any(|suffix| compact.ends_with(suffix))
}

/// Notional falloff across the first levels of both ladders
///
/// Ratio of the touch-level notional to the mean level notional; flat books
/// (deep beyond the touch) approach 0, books with all liquidity at the
/// touch approach 1.
pub(crate) fn liquidity_gradient(bids: &[PriceLevel], asks: &[PriceLevel]) -> f64 {
    use rust_decimal::prelude::ToPrimitive;

    let notionals: Vec<f64> = bids
        .iter()
        .chain(asks.iter())
        .filter_map(|l| l.notional().to_f64())
        .collect();
    if notionals.is_empty() {
        return 0.0;
    }
    let total: f64 = notionals.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let touch = bids
        .first()
        .into_iter()
        .chain(asks.first())
        .filter_map(|l| l.notional().to_f64())
        .sum::<f64>();
    (touch / total).clamp(0.0, 1.0)
}
