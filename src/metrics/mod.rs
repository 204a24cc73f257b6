//! Gate-value calculators
//!
//! CPU-bound, non-blocking measurements over a venue's order book:
//! - Rolling spread statistics over a 60s window
//! - Notional depth within ±2% of the last price, plus impact estimation
//! - Volume-Adjusted Daily Range with 24h percentile history
//!
//! Calculators fail fast on invalid books; a failure marks the
//! corresponding gate failed and is preserved in the proof bundle.

pub mod depth;
pub mod spread;
pub mod vadr;

use thiserror::Error;

pub use depth::{estimate_impact, DepthStats, ImpactEstimate, Side};
pub use spread::{SampleQuality, SpreadCalculator, SpreadStats};
pub use vadr::{HistoryAdequacy, VadrCalculator, VadrInput, VadrPercentiles, VadrResult};

/// Calculator input failures
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("crossed or invalid book: bid={bid} ask={ask}")]
    CrossedOrInvalidBook { bid: f64, ask: f64 },

    #[error("non-positive {field}: {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("24h high {high} below low {low}")]
    InvertedRange { high: f64, low: f64 },

    #[error("non-positive volume multiple: {0}")]
    ZeroVolumeMultiple(f64),

    #[error("empty book side: {0}")]
    EmptySide(&'static str),
}
