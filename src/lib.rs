//! Microstructure execution-feasibility engine
//!
//! Decides, for a candidate symbol on a set of exchange venues, whether
//! the live order books are healthy enough to execute a position of a
//! given size. Produces a tiered, gated verdict (proceed / halve_size /
//! defer) and a reproducible proof bundle per evaluation.
//!
//! Data provenance is exchange-native only: aggregator and composite
//! feeds are rejected at the adapter boundary and at evaluation time.

pub mod config;
pub mod error;
pub mod gates;
pub mod health;
pub mod metrics;
pub mod orderbook;
pub mod proof;
pub mod tiers;
pub mod venue;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use gates::{
    BatchRequest, EvalOutcome, GateEvaluator, GateReport, RecommendedAction, TieredGateResult,
};
pub use health::{SizingRecommendation, VenueHealthMonitor, VenueHealthStatus};
pub use metrics::VadrInput;
pub use orderbook::{BookQuality, OrderBookSnapshot, PriceLevel};
pub use proof::{FileProofSink, ProofBundle, ProofSink};
pub use tiers::{LiquidityTier, TierLadder};
pub use venue::{AggregatorGuard, GuardMode, VenueAdapter};
