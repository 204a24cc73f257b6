//! Order book data structures and types
//!
//! Core entities for execution-feasibility analysis: price levels, source
//! attribution, and the per-venue snapshot with its invariants.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single `(price, size)` level; both strictly positive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriceLevel {
    /// Level price (quote currency)
    #[schemars(with = "String")]
    pub price: Decimal,

    /// Level size (base currency)
    #[schemars(with = "String")]
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Notional value of this level in quote currency
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Book-quality tag attached by the venue adapter
///
/// `Full` is a complete ladder from the venue's depth endpoint, `Partial`
/// a truncated ladder, `Degraded` a ladder reconstructed after gaps or
/// served from a stale cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookQuality {
    Full,
    Partial,
    Degraded,
}

/// Source attribution for a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceMeta {
    /// Exchange-assigned sequence / update id
    pub sequence: u64,

    /// Set when the venue reported the data as stale
    pub stale: bool,

    /// Book-quality tag
    pub quality: BookQuality,
}

/// Snapshot invariant violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("crossed or invalid book: bid={bid} ask={ask}")]
    CrossedBook { bid: String, ask: String },

    #[error("non-positive price in {side} ladder")]
    NonPositivePrice { side: &'static str },

    #[error("insufficient levels: {side} has {got}, minimum {min}")]
    InsufficientLevels {
        side: &'static str,
        got: usize,
        min: usize,
    },

    #[error("snapshot stale: age {age_ms}ms exceeds cap {cap_ms}ms")]
    Stale { age_ms: i64, cap_ms: i64 },

    #[error("empty book side: {0}")]
    EmptySide(&'static str),
}

/// Per-venue, per-symbol order book snapshot
///
/// Bids are ordered descending by price, asks ascending; the head of each
/// ladder is the best level. Captured once per evaluation and embedded in
/// the resulting proof bundle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrderBookSnapshot {
    /// Venue identifier (lowercase, e.g. "binance")
    pub venue: String,

    /// Trading pair symbol (uppercase, e.g. "BTCUSDT")
    pub symbol: String,

    /// Capture timestamp
    pub captured_at: DateTime<Utc>,

    /// Last trade price reported by the venue
    #[schemars(with = "String")]
    pub last_price: Decimal,

    /// Bid levels, descending price
    pub bids: Vec<PriceLevel>,

    /// Ask levels, ascending price
    pub asks: Vec<PriceLevel>,

    /// Source attribution
    pub source: SourceMeta,
}

impl OrderBookSnapshot {
    /// Best bid (highest price), if any
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Best ask (lowest price), if any
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Mid price between best bid and best ask
    pub fn mid(&self) -> Option<f64> {
        let bid = self.best_bid()?.price.to_f64()?;
        let ask = self.best_ask()?.price.to_f64()?;
        Some((bid + ask) / 2.0)
    }

    /// Snapshot age relative to `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    /// Validate snapshot invariants
    ///
    /// Checks, in order: non-empty sides, positive best prices, uncrossed
    /// book, minimum level counts, and freshness against `max_age`.
    pub fn validate_at(
        &self,
        min_levels: usize,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), SnapshotError> {
        let best_bid = self.best_bid().ok_or(SnapshotError::EmptySide("bid"))?;
        let best_ask = self.best_ask().ok_or(SnapshotError::EmptySide("ask"))?;

        if best_bid.price <= Decimal::ZERO {
            return Err(SnapshotError::NonPositivePrice { side: "bid" });
        }
        if best_ask.price <= Decimal::ZERO {
            return Err(SnapshotError::NonPositivePrice { side: "ask" });
        }
        if best_ask.price <= best_bid.price {
            return Err(SnapshotError::CrossedBook {
                bid: best_bid.price.to_string(),
                ask: best_ask.price.to_string(),
            });
        }
        if self.bids.len() < min_levels {
            return Err(SnapshotError::InsufficientLevels {
                side: "bid",
                got: self.bids.len(),
                min: min_levels,
            });
        }
        if self.asks.len() < min_levels {
            return Err(SnapshotError::InsufficientLevels {
                side: "ask",
                got: self.asks.len(),
                min: min_levels,
            });
        }

        let age = self.age_at(now);
        if age > max_age {
            return Err(SnapshotError::Stale {
                age_ms: age.num_milliseconds(),
                cap_ms: max_age.num_milliseconds(),
            });
        }

        Ok(())
    }

    /// Validate against the current wall clock
    pub fn validate(&self, min_levels: usize, max_age: Duration) -> Result<(), SnapshotError> {
        self.validate_at(min_levels, max_age, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn level(price: f64, size: f64) -> PriceLevel {
        PriceLevel::new(
            Decimal::from_f64(price).unwrap(),
            Decimal::from_f64(size).unwrap(),
        )
    }

    fn snapshot(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> OrderBookSnapshot {
        OrderBookSnapshot {
            venue: "binance".to_string(),
            symbol: "BTCUSDT".to_string(),
            captured_at: Utc::now(),
            last_price: Decimal::from_f64(50_000.0).unwrap(),
            bids,
            asks,
            source: SourceMeta {
                sequence: 1,
                stale: false,
                quality: BookQuality::Full,
            },
        }
    }

    #[test]
    fn test_best_levels_and_mid() {
        let snap = snapshot(
            vec![level(49_990.0, 1.0), level(49_980.0, 2.0)],
            vec![level(50_010.0, 1.0), level(50_020.0, 2.0)],
        );
        assert_eq!(snap.best_bid().unwrap().price.to_f64().unwrap(), 49_990.0);
        assert_eq!(snap.best_ask().unwrap().price.to_f64().unwrap(), 50_010.0);
        assert!((snap.mid().unwrap() - 50_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_crossed_book_rejected() {
        let snap = snapshot(vec![level(50_100.0, 1.0)], vec![level(49_900.0, 1.0)]);
        let err = snap.validate_at(1, Duration::seconds(5), Utc::now());
        assert!(matches!(err, Err(SnapshotError::CrossedBook { .. })));
    }

    #[test]
    fn test_minimum_levels_enforced() {
        let snap = snapshot(
            vec![level(49_990.0, 1.0)],
            vec![level(50_010.0, 1.0), level(50_020.0, 1.0)],
        );
        let err = snap.validate_at(2, Duration::seconds(5), Utc::now());
        assert_eq!(
            err,
            Err(SnapshotError::InsufficientLevels {
                side: "bid",
                got: 1,
                min: 2
            })
        );
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let mut snap = snapshot(vec![level(49_990.0, 1.0)], vec![level(50_010.0, 1.0)]);
        let now = Utc::now();
        snap.captured_at = now - Duration::seconds(10);
        let err = snap.validate_at(1, Duration::seconds(5), now);
        assert!(matches!(err, Err(SnapshotError::Stale { .. })));
    }

    #[test]
    fn test_level_notional() {
        let lvl = level(50_000.0, 2.0);
        assert_eq!(lvl.notional().to_f64().unwrap(), 100_000.0);
    }
}
