//! Depth within ±2% of the last price, and market-impact estimation
//!
//! Depth walks each ladder from the touch and accumulates notional while
//! levels stay inside the band, breaking on the first out-of-band level.
//! The impact estimator walks the far side of the book for a dollar-sized
//! market order and reports VWAP and slippage.

use rust_decimal::prelude::ToPrimitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::CalcError;
use crate::orderbook::OrderBookSnapshot;
use crate::tiers::LiquidityTier;

/// Band half-width around the last price
const BAND_PCT: f64 = 0.02;

/// Notional liquidity within the ±2% band
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DepthStats {
    /// Bid-side notional inside the band, USD
    pub bid_depth_usd: f64,

    /// Ask-side notional inside the band, USD
    pub ask_depth_usd: f64,

    /// Total notional inside the band, USD
    pub total_depth_usd: f64,

    /// Bid levels inside the band
    pub bid_levels: usize,

    /// Ask levels inside the band
    pub ask_levels: usize,

    /// Band lower bound: last × 0.98
    pub lower_bound: f64,

    /// Band upper bound: last × 1.02
    pub upper_bound: f64,

    /// Last trade price the band is centered on
    pub reference_price: f64,
}

/// Trade side for impact estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Result of walking the book for a dollar-sized market order
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImpactEstimate {
    /// Dollar amount actually filled
    pub filled_usd: f64,

    /// Base quantity filled
    pub filled_qty: f64,

    /// Volume-weighted average fill price
    pub vwap: f64,

    /// |vwap - touch| / touch × 10_000
    pub slippage_bps: f64,

    /// Levels consumed, including a partially consumed last level
    pub levels_consumed: usize,

    /// Set when the book could not fill the full size
    pub insufficient_liquidity: bool,

    /// Unfilled remainder, USD
    pub shortfall_usd: f64,
}

/// Compute band depth for a snapshot
pub fn compute(snapshot: &OrderBookSnapshot) -> Result<DepthStats, CalcError> {
    let last = snapshot.last_price.to_f64().unwrap_or(0.0);
    if last <= 0.0 {
        return Err(CalcError::NonPositive {
            field: "last_price",
            value: last,
        });
    }

    let lower = last * (1.0 - BAND_PCT);
    let upper = last * (1.0 + BAND_PCT);

    let mut bid_depth = 0.0;
    let mut bid_levels = 0;
    for level in &snapshot.bids {
        let price = level.price.to_f64().unwrap_or(0.0);
        if price < lower {
            break;
        }
        bid_depth += price * level.size.to_f64().unwrap_or(0.0);
        bid_levels += 1;
    }

    let mut ask_depth = 0.0;
    let mut ask_levels = 0;
    for level in &snapshot.asks {
        let price = level.price.to_f64().unwrap_or(0.0);
        if price > upper {
            break;
        }
        ask_depth += price * level.size.to_f64().unwrap_or(0.0);
        ask_levels += 1;
    }

    Ok(DepthStats {
        bid_depth_usd: bid_depth,
        ask_depth_usd: ask_depth,
        total_depth_usd: bid_depth + ask_depth,
        bid_levels,
        ask_levels,
        lower_bound: lower,
        upper_bound: upper,
        reference_price: last,
    })
}

/// Depth gate: total band notional against the tier floor
pub fn validate(stats: &DepthStats, tier: &LiquidityTier) -> bool {
    stats.total_depth_usd >= tier.depth_floor_usd
}

/// Estimate the fill for a `trade_usd`-sized market order
///
/// Buys consume the ask ladder, sells the bid ladder. A book that runs out
/// of levels reports `insufficient_liquidity` with the dollar shortfall
/// rather than failing.
pub fn estimate_impact(
    snapshot: &OrderBookSnapshot,
    side: Side,
    trade_usd: f64,
) -> Result<ImpactEstimate, CalcError> {
    if trade_usd <= 0.0 {
        return Err(CalcError::NonPositive {
            field: "trade_usd",
            value: trade_usd,
        });
    }

    let levels = match side {
        Side::Buy => &snapshot.asks,
        Side::Sell => &snapshot.bids,
    };
    let touch = levels
        .first()
        .and_then(|l| l.price.to_f64())
        .filter(|p| *p > 0.0)
        .ok_or(CalcError::EmptySide(match side {
            Side::Buy => "ask",
            Side::Sell => "bid",
        }))?;

    let mut filled_usd = 0.0;
    let mut filled_qty = 0.0;
    let mut levels_consumed = 0;

    for level in levels {
        let price = level.price.to_f64().unwrap_or(0.0);
        let size = level.size.to_f64().unwrap_or(0.0);
        if price <= 0.0 || size <= 0.0 {
            continue;
        }

        let level_usd = price * size;
        let remaining = trade_usd - filled_usd;
        levels_consumed += 1;

        if level_usd >= remaining {
            filled_qty += remaining / price;
            filled_usd += remaining;
            break;
        }
        filled_qty += size;
        filled_usd += level_usd;
    }

    let insufficient = filled_usd + f64::EPSILON < trade_usd;
    let vwap = if filled_qty > 0.0 {
        filled_usd / filled_qty
    } else {
        0.0
    };
    let slippage_bps = if filled_qty > 0.0 {
        ((vwap - touch) / touch).abs() * 10_000.0
    } else {
        0.0
    };

    Ok(ImpactEstimate {
        filled_usd,
        filled_qty,
        vwap,
        slippage_bps,
        levels_consumed,
        insufficient_liquidity: insufficient,
        shortfall_usd: (trade_usd - filled_usd).max(0.0),
    })
}
