//! Order book snapshot model
//!
//! Per-venue, per-symbol snapshots captured once per evaluation:
//! - Bid/ask ladders with decimal precision
//! - Source attribution (exchange sequence, staleness, book quality)
//! - Invariant validation (uncrossed book, minimum levels, freshness)
//!
//! Snapshots are ephemeral: captured, measured, embedded in the proof
//! bundle, and discarded.

pub mod types;

pub use types::{BookQuality, OrderBookSnapshot, PriceLevel, SnapshotError, SourceMeta};
