//! Proof bundles
//!
//! Immutable audit artifacts capturing the inputs, measurements,
//! thresholds, and verdict of one evaluation. Schema changes are
//! append-only; removals require a `schema_version` bump.

pub mod writer;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub use writer::{AuditReport, FileProofSink, ProofSink};

use crate::metrics::{DepthStats, SpreadStats, VadrResult};
use crate::orderbook::OrderBookSnapshot;

/// Current bundle schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Proof sink failures
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("failed to serialize bundle: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write artifact: {0}")]
    Sink(#[from] anyhow::Error),
}

/// Comparison operator carried by a validation proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CmpOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CmpOp {
    /// Apply the operator to `(actual, required)`
    pub fn holds(&self, actual: f64, required: f64) -> bool {
        match self {
            CmpOp::Lt => actual < required,
            CmpOp::Le => actual <= required,
            CmpOp::Gt => actual > required,
            CmpOp::Ge => actual >= required,
        }
    }
}

/// One gate's evidence record
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValidationProof {
    /// Metric name (e.g. "spread_bps")
    pub metric: String,

    /// Measured value
    pub actual: f64,

    /// Threshold the measurement was held to
    pub required: f64,

    /// How `actual` relates to `required` when passing
    pub operator: CmpOp,

    pub passed: bool,

    /// Human-readable account of the measurement
    pub evidence: String,
}

impl ValidationProof {
    pub fn new(
        metric: &str,
        actual: f64,
        required: f64,
        operator: CmpOp,
        evidence: String,
    ) -> Self {
        Self {
            metric: metric.to_string(),
            actual,
            required,
            operator,
            passed: operator.holds(actual, required),
            evidence,
        }
    }

    /// A proof that failed without a measurement (no venue data)
    pub fn failed(metric: &str, required: f64, operator: CmpOp, evidence: String) -> Self {
        Self {
            metric: metric.to_string(),
            actual: 0.0,
            required,
            operator,
            passed: false,
            evidence,
        }
    }
}

/// Measured values backing the gate verdicts
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MicrostructureMetrics {
    /// Rolling spread statistics for the primary venue
    pub spread: Option<SpreadStats>,

    /// Band depth for the primary venue
    pub depth: Option<DepthStats>,

    /// Quality-adjusted depth used by the depth gate, USD
    pub quality_adjusted_depth_usd: Option<f64>,

    /// VADR evaluation
    pub vadr: Option<VadrResult>,

    /// Composite data-quality score, 0..5
    pub data_quality_score: u8,

    /// Score mapped to a label: excellent / good / degraded
    pub data_quality: String,

    /// Venues that supplied usable data
    pub venues_available: usize,
}

/// Immutable audit artifact for one evaluation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProofBundle {
    /// Bundle schema version; field removals bump this
    pub schema_version: u32,

    /// Asset symbol (uppercase)
    pub asset_symbol: String,

    /// Capture timestamp of the evaluated data, epoch milliseconds
    pub timestamp_mono: i64,

    /// True when every gate passed with no critical failures
    pub proven_valid: bool,

    /// Primary venue's order book at evaluation time
    pub order_book_snapshot: Option<OrderBookSnapshot>,

    pub microstructure_metrics: MicrostructureMetrics,

    /// Primary venue the verdict rests on
    pub venue_used: Option<String>,

    pub spread_proof: ValidationProof,
    pub depth_proof: ValidationProof,
    pub vadr_proof: ValidationProof,

    /// Every failure reason from the evaluation, verbatim and in
    /// discovery order (venue drops, critical failures, gate failures)
    pub failure_reasons: Vec<String>,

    /// When this bundle was generated
    pub proof_generated_at: DateTime<Utc>,

    /// `<SYMBOL>-<YYYYMMDD-HHMMSS>-<8 hex>`
    pub proof_id: String,
}

/// Build a proof identifier for `symbol` at `at`
///
/// The 8-hex suffix hashes the symbol, the instant, and fresh entropy, so
/// two evaluations of identical inputs still get distinct identifiers.
pub fn proof_id(symbol: &str, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hasher.finalize();
    format!(
        "{}-{}-{}",
        symbol.to_uppercase(),
        at.format("%Y%m%d-%H%M%S"),
        &hex::encode(digest)[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmp_op_semantics() {
        assert!(CmpOp::Le.holds(4.0, 25.0));
        assert!(CmpOp::Le.holds(25.0, 25.0));
        assert!(!CmpOp::Le.holds(26.0, 25.0));
        assert!(CmpOp::Ge.holds(200_000.0, 150_000.0));
        assert!(!CmpOp::Gt.holds(1.0, 1.0));
        assert!(CmpOp::Lt.holds(0.5, 1.0));
    }

    #[test]
    fn test_cmp_op_serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&CmpOp::Le).unwrap(), "\"<=\"");
        assert_eq!(serde_json::to_string(&CmpOp::Ge).unwrap(), "\">=\"");
    }

    #[test]
    fn test_validation_proof_derives_pass() {
        let proof = ValidationProof::new(
            "spread_bps",
            4.0,
            25.0,
            CmpOp::Le,
            "rolling spread 4.00 bps within cap".to_string(),
        );
        assert!(proof.passed);

        let proof = ValidationProof::new(
            "vadr",
            0.06,
            1.85,
            CmpOp::Ge,
            "vadr below floor".to_string(),
        );
        assert!(!proof.passed);
    }

    #[test]
    fn test_proof_id_shape() {
        let at = DateTime::parse_from_rfc3339("2025-06-01T12:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = proof_id("btcusdt", at);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts[0], "BTCUSDT");
        assert_eq!(parts[1], "20250601");
        assert_eq!(parts[2], "123045");
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));

        // fresh entropy keeps ids distinct for identical inputs
        assert_ne!(proof_id("btcusdt", at), proof_id("btcusdt", at));
    }
}
