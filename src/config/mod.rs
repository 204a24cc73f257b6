//! Configuration Management
//!
//! The evaluator's configuration surface: venue priority, freshness and
//! latency limits, health thresholds, the tier ladder, and the gate
//! policy knobs. Defaults match production values; deployments override
//! via JSON deserialization.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orderbook::BookQuality;
use crate::tiers::{default_tiers, LiquidityTier, TierError, TierLadder};

/// Depth multipliers by book quality
///
/// Discounts depth observed through partial or degraded books before the
/// cross-venue maximum is taken.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct QualityMultipliers {
    pub full: f64,
    pub partial: f64,
    pub degraded: f64,
}

impl QualityMultipliers {
    pub fn for_quality(&self, quality: BookQuality) -> f64 {
        match quality {
            BookQuality::Full => self.full,
            BookQuality::Partial => self.partial,
            BookQuality::Degraded => self.degraded,
        }
    }
}

impl Default for QualityMultipliers {
    fn default() -> Self {
        Self {
            full: 1.0,
            partial: 0.95,
            degraded: 0.85,
        }
    }
}

/// Configuration errors raised by [`EngineConfig::validate`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("venue priority list is empty")]
    EmptyVenuePriority,

    #[error("venue '{0}' is not a supported exchange")]
    UnsupportedVenue(String),

    #[error("required_venues {required} exceeds configured venues {configured}")]
    RequiredExceedsConfigured { required: usize, configured: usize },

    #[error("invalid tier ladder: {0}")]
    Tiers(#[from] TierError),

    #[error("{field} must be positive")]
    NonPositive { field: &'static str },
}

/// Evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// Ordered venue identifiers tried in sequence
    pub venue_priority: Vec<String>,

    /// Rolling-window length for spread statistics, seconds
    pub spread_window_seconds: u32,

    /// Reserved for future time-weighted depth
    pub depth_window_seconds: u32,

    /// Hard freshness limit per venue, seconds
    pub max_data_age_seconds: u32,

    /// Minimum L2 levels required on each side
    pub min_book_levels: usize,

    /// Health: reject-rate cap, percent
    pub reject_rate_threshold: f64,

    /// Health: p99 latency cap, milliseconds
    pub latency_threshold_ms: f64,

    /// Health: error-rate cap, percent
    pub error_rate_threshold: f64,

    /// Allowlist checked at adapter construction
    pub supported_venues: Vec<String>,

    /// Tier records, any order; sorted at load
    pub liquidity_tiers: Vec<LiquidityTier>,

    /// VADR floor = max(tier, p80) when true; tier only when false
    pub use_worst_feed_vadr: bool,

    /// Cross-venue spread divergence warning threshold, bps
    pub spread_tolerance_bps: f64,

    /// Minimum healthy venue count to proceed
    pub required_venues: usize,

    /// Per-venue fetch deadline, seconds
    pub max_venue_age_seconds: u64,

    /// Depth discounts by book quality
    pub depth_quality_multipliers: QualityMultipliers,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            venue_priority: vec![
                "binance".to_string(),
                "okx".to_string(),
                "coinbase".to_string(),
            ],
            spread_window_seconds: 60,
            depth_window_seconds: 60,
            max_data_age_seconds: 5,
            min_book_levels: 5,
            reject_rate_threshold: 5.0,
            latency_threshold_ms: 2000.0,
            error_rate_threshold: 3.0,
            supported_venues: crate::venue::SUPPORTED_VENUES
                .iter()
                .map(|v| v.to_string())
                .collect(),
            liquidity_tiers: default_tiers(),
            use_worst_feed_vadr: true,
            spread_tolerance_bps: 5.0,
            required_venues: 1,
            max_venue_age_seconds: 30,
            depth_quality_multipliers: QualityMultipliers::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration and build the tier ladder
    pub fn validate(&self) -> Result<TierLadder, ConfigError> {
        if self.venue_priority.is_empty() {
            return Err(ConfigError::EmptyVenuePriority);
        }
        // priority venues must sit in the deployment's own allowlist; the
        // static exchange allowlist is enforced at adapter construction
        for venue in &self.venue_priority {
            let lowered = venue.to_lowercase();
            if !self
                .supported_venues
                .iter()
                .any(|v| v.to_lowercase() == lowered)
            {
                return Err(ConfigError::UnsupportedVenue(venue.clone()));
            }
        }
        if self.required_venues > self.venue_priority.len() {
            return Err(ConfigError::RequiredExceedsConfigured {
                required: self.required_venues,
                configured: self.venue_priority.len(),
            });
        }
        if self.spread_window_seconds == 0 {
            return Err(ConfigError::NonPositive {
                field: "spread_window_seconds",
            });
        }
        if self.max_venue_age_seconds == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_venue_age_seconds",
            });
        }

        Ok(TierLadder::new(self.liquidity_tiers.clone())?)
    }

    /// Health thresholds derived from the config
    pub fn health_thresholds(&self) -> crate::health::HealthThresholds {
        crate::health::HealthThresholds {
            reject_rate_pct: self.reject_rate_threshold,
            p99_latency_ms: self.latency_threshold_ms,
            error_rate_pct: self.error_rate_threshold,
            ..Default::default()
        }
    }
}
