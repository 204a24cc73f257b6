//! Tiered gate evaluation
//!
//! The orchestrator and its result model: per-venue observations, the
//! three gate verdicts, the sizing action, and the terminal outcome. One
//! evaluation produces one `TieredGateResult` and one proof bundle.

pub mod evaluator;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::health::VenueHealthStatus;
use crate::orderbook::BookQuality;
use crate::tiers::TierGateCheck;

pub use evaluator::{BatchRequest, GateEvaluator};

/// Verdict on how to size the candidate position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Proceed,
    HalveSize,
    Defer,
}

/// Terminal state of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvalOutcome {
    Pass,
    Fail,
    InsufficientVenues,
}

/// Composite data-quality label for the winning snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Excellent,
    Good,
    Degraded,
}

impl DataQuality {
    /// Map the 0..5 composite score: >=4 excellent, 3 good, else degraded
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 4 => Self::Excellent,
            3 => Self::Good,
            _ => Self::Degraded,
        }
    }
}

/// Measured values next to the thresholds they were held to
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GateDetail {
    /// Tier the thresholds came from
    pub tier: String,

    /// ADV fell below every tier; lowest tier was assigned
    pub tier_below_minimum: bool,

    /// Tightest rolling-average spread across venues, bps
    pub spread_bps: Option<f64>,

    pub spread_cap_bps: f64,

    /// Cross-venue spread divergence (max - min), bps
    pub spread_divergence_bps: Option<f64>,

    /// Best quality-adjusted depth across venues, USD
    pub depth_usd: Option<f64>,

    pub depth_floor_usd: f64,

    /// Current VADR observation
    pub vadr: Option<f64>,

    /// Bar the VADR was held to: max(p80, floor) or the floor alone
    pub vadr_effective_min: f64,
}

/// What one venue contributed to the evaluation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VenueObservation {
    pub venue: String,

    /// Venue delivered usable L1+L2 inside its deadline
    pub available: bool,

    /// Failure reason when unavailable
    pub error: Option<String>,

    /// Wall-clock fetch latency, milliseconds
    pub latency_ms: u64,

    /// Venue-reported data age, milliseconds
    pub data_age_ms: Option<i64>,

    pub quality: Option<BookQuality>,

    /// Rolling-average spread for this venue, bps
    pub spread_bps: Option<f64>,

    /// Raw band depth, USD
    pub depth_usd: Option<f64>,

    /// Depth after the quality multiplier, USD
    pub quality_adjusted_depth_usd: Option<f64>,

    /// This venue's measurements against the applicable tier
    pub gate_check: Option<TierGateCheck>,
}

impl VenueObservation {
    /// An unavailable venue with its failure reason
    pub fn unavailable(venue: &str, latency_ms: u64, error: String) -> Self {
        Self {
            venue: venue.to_string(),
            available: false,
            error: Some(error),
            latency_ms,
            data_age_ms: None,
            quality: None,
            spread_bps: None,
            depth_usd: None,
            quality_adjusted_depth_usd: None,
            gate_check: None,
        }
    }
}

/// Single-venue gate verdict
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GateReport {
    /// Trading pair symbol (uppercase)
    pub symbol: String,

    /// Primary venue the verdict rests on
    pub venue: Option<String>,

    /// Capture timestamp of the evaluated data
    pub captured_at: DateTime<Utc>,

    pub depth_ok: bool,
    pub spread_ok: bool,
    pub vadr_ok: bool,

    pub detail: GateDetail,

    /// Health snapshot of the primary venue
    pub venue_health: Option<VenueHealthStatus>,

    /// All gates passed and no critical failures
    pub execution_feasible: bool,

    pub recommended_action: RecommendedAction,

    /// Every failure reason in discovery order, critical failures
    /// included; carried verbatim into the proof bundle
    pub failure_reasons: Vec<String>,
}

/// Multi-venue evaluation result
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TieredGateResult {
    pub report: GateReport,

    /// Per-venue observations, keyed by venue identifier
    pub venue_results: BTreeMap<String, VenueObservation>,

    /// First available venue in priority order
    pub primary_venue: Option<String>,

    /// Remaining available venues, priority order
    pub fallbacks_used: Vec<String>,

    /// Exactly one venue survived
    pub degraded_mode: bool,

    /// Failures that force a defer verdict on their own; each entry also
    /// appears in `report.failure_reasons`
    pub critical_failures: Vec<String>,

    pub warnings: Vec<String>,

    pub outcome: EvalOutcome,

    /// End-to-end evaluation latency, milliseconds
    pub processing_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_quality_mapping() {
        assert_eq!(DataQuality::from_score(5), DataQuality::Excellent);
        assert_eq!(DataQuality::from_score(4), DataQuality::Excellent);
        assert_eq!(DataQuality::from_score(3), DataQuality::Good);
        assert_eq!(DataQuality::from_score(2), DataQuality::Degraded);
        assert_eq!(DataQuality::from_score(0), DataQuality::Degraded);
    }

    #[test]
    fn test_action_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RecommendedAction::HalveSize).unwrap(),
            "\"halve_size\""
        );
        assert_eq!(
            serde_json::to_string(&EvalOutcome::InsufficientVenues).unwrap(),
            "\"insufficient_venues\""
        );
    }

    #[test]
    fn test_unavailable_observation() {
        let obs = VenueObservation::unavailable("okx", 2100, "transport_error: timeout".into());
        assert!(!obs.available);
        assert_eq!(obs.latency_ms, 2100);
        assert!(obs.gate_check.is_none());
    }
}
