//! Liquidity tier resolution
//!
//! Maps Average Daily Volume (USD) onto the tier ladder that supplies each
//! gate's requirements: depth floor, spread cap, and VADR floor. Tiers
//! partition the ADV axis; the ladder is sorted descending by `adv_min` at
//! load time and immutable afterwards.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// One tier record over the `[adv_min, adv_max)` interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LiquidityTier {
    /// Tier name (e.g. "tier1")
    pub name: String,

    /// ADV lower bound, inclusive, USD
    pub adv_min: f64,

    /// ADV upper bound, exclusive, USD; `f64::INFINITY` for the top tier
    #[serde(default = "unbounded")]
    pub adv_max: f64,

    /// Minimum notional within ±2% of mid, USD
    pub depth_floor_usd: f64,

    /// Maximum rolling-average spread, basis points
    pub spread_cap_bps: f64,

    /// Minimum Volume-Adjusted Daily Range, dimensionless
    pub vadr_floor: f64,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

impl LiquidityTier {
    fn contains(&self, adv: f64) -> bool {
        adv >= self.adv_min && adv < self.adv_max
    }
}

/// Default ladder: tier1 [5e6, inf), tier2 [1e6, 5e6), tier3 [1e5, 1e6)
pub fn default_tiers() -> Vec<LiquidityTier> {
    vec![
        LiquidityTier {
            name: "tier1".to_string(),
            adv_min: 5_000_000.0,
            adv_max: f64::INFINITY,
            depth_floor_usd: 150_000.0,
            spread_cap_bps: 25.0,
            vadr_floor: 1.85,
        },
        LiquidityTier {
            name: "tier2".to_string(),
            adv_min: 1_000_000.0,
            adv_max: 5_000_000.0,
            depth_floor_usd: 75_000.0,
            spread_cap_bps: 50.0,
            vadr_floor: 1.80,
        },
        LiquidityTier {
            name: "tier3".to_string(),
            adv_min: 100_000.0,
            adv_max: 1_000_000.0,
            depth_floor_usd: 25_000.0,
            spread_cap_bps: 80.0,
            vadr_floor: 1.75,
        },
    ]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("tier ladder is empty")]
    EmptyLadder,

    #[error("negative ADV: {0}")]
    NegativeAdv(String),

    #[error("tier intervals overlap: {0} and {1}")]
    Overlap(String, String),
}

/// Resolution result: the applicable tier plus a below-minimum flag
#[derive(Debug, Clone, PartialEq)]
pub struct TierMatch<'a> {
    pub tier: &'a LiquidityTier,

    /// Set when ADV fell below every tier and the lowest tier was assigned
    pub below_minimum: bool,
}

/// Per-gate pass/fail record for concrete measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TierGateCheck {
    pub depth_ok: bool,
    pub spread_ok: bool,
    pub vadr_ok: bool,
}

impl TierGateCheck {
    pub fn all_pass(&self) -> bool {
        self.depth_ok && self.spread_ok && self.vadr_ok
    }
}

/// Immutable, sorted tier ladder
#[derive(Debug, Clone)]
pub struct TierLadder {
    tiers: Vec<LiquidityTier>,
}

impl TierLadder {
    /// Build a ladder, sorting descending by `adv_min` and rejecting
    /// overlapping intervals
    pub fn new(mut tiers: Vec<LiquidityTier>) -> Result<Self, TierError> {
        if tiers.is_empty() {
            return Err(TierError::EmptyLadder);
        }
        tiers.sort_by(|a, b| {
            b.adv_min
                .partial_cmp(&a.adv_min)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for pair in tiers.windows(2) {
            // descending order: the lower tier's interval must end at or
            // below the higher tier's start
            if pair[1].adv_max > pair[0].adv_min {
                return Err(TierError::Overlap(
                    pair[0].name.clone(),
                    pair[1].name.clone(),
                ));
            }
        }
        Ok(Self { tiers })
    }

    /// Ladder with the default tiers
    pub fn default_ladder() -> Self {
        Self::new(default_tiers()).expect("default tiers are well-formed")
    }

    pub fn tiers(&self) -> &[LiquidityTier] {
        &self.tiers
    }

    /// Resolve ADV to its tier
    ///
    /// ADV below every tier resolves to the lowest tier with
    /// `below_minimum` set; negative ADV is rejected.
    pub fn resolve(&self, adv_usd: f64) -> Result<TierMatch<'_>, TierError> {
        if adv_usd < 0.0 || !adv_usd.is_finite() {
            return Err(TierError::NegativeAdv(format!("{adv_usd}")));
        }
        if let Some(tier) = self.tiers.iter().find(|t| t.contains(adv_usd)) {
            return Ok(TierMatch {
                tier,
                below_minimum: false,
            });
        }
        let lowest = self.tiers.last().ok_or(TierError::EmptyLadder)?;
        warn!(
            adv_usd,
            tier = %lowest.name,
            "ADV below all tiers, assigning lowest with below-minimum warning"
        );
        Ok(TierMatch {
            tier: lowest,
            below_minimum: true,
        })
    }

    /// Check concrete measurements against a tier's requirements
    pub fn check(
        tier: &LiquidityTier,
        depth_usd: f64,
        spread_bps: f64,
        vadr: f64,
    ) -> TierGateCheck {
        TierGateCheck {
            depth_ok: depth_usd >= tier.depth_floor_usd,
            spread_ok: spread_bps <= tier.spread_cap_bps,
            vadr_ok: vadr >= tier.vadr_floor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_resolution() {
        let ladder = TierLadder::default_ladder();

        let t1 = ladder.resolve(10_000_000.0).unwrap();
        assert_eq!(t1.tier.name, "tier1");
        assert!(!t1.below_minimum);

        let t2 = ladder.resolve(2_000_000.0).unwrap();
        assert_eq!(t2.tier.name, "tier2");

        let t3 = ladder.resolve(100_000.0).unwrap();
        assert_eq!(t3.tier.name, "tier3");
        assert!(!t3.below_minimum);
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let ladder = TierLadder::default_ladder();
        // 5e6 belongs to tier1 (inclusive lower bound), 5e6 - epsilon to tier2
        assert_eq!(ladder.resolve(5_000_000.0).unwrap().tier.name, "tier1");
        assert_eq!(ladder.resolve(4_999_999.0).unwrap().tier.name, "tier2");
        assert_eq!(ladder.resolve(1_000_000.0).unwrap().tier.name, "tier2");
        assert_eq!(ladder.resolve(999_999.0).unwrap().tier.name, "tier3");
    }

    #[test]
    fn test_below_minimum_assigns_lowest_with_warning() {
        let ladder = TierLadder::default_ladder();
        let m = ladder.resolve(50_000.0).unwrap();
        assert_eq!(m.tier.name, "tier3");
        assert!(m.below_minimum);

        let zero = ladder.resolve(0.0).unwrap();
        assert!(zero.below_minimum);
    }

    #[test]
    fn test_negative_adv_rejected() {
        let ladder = TierLadder::default_ladder();
        assert!(matches!(
            ladder.resolve(-1.0),
            Err(TierError::NegativeAdv(_))
        ));
        assert!(ladder.resolve(f64::NAN).is_err());
    }

    #[test]
    fn test_resolved_interval_contains_value() {
        let ladder = TierLadder::default_ladder();
        for adv in [1e5, 5e5, 1e6, 3e6, 5e6, 1e8] {
            let m = ladder.resolve(adv).unwrap();
            assert!(adv >= m.tier.adv_min && adv < m.tier.adv_max);
        }
    }

    #[test]
    fn test_overlapping_tiers_rejected() {
        let mut tiers = default_tiers();
        tiers[1].adv_max = 6_000_000.0; // overlaps tier1
        assert!(matches!(
            TierLadder::new(tiers),
            Err(TierError::Overlap(_, _))
        ));
    }

    #[test]
    fn test_gate_check() {
        let ladder = TierLadder::default_ladder();
        let tier1 = &ladder.tiers()[0];

        let check = TierLadder::check(tier1, 200_000.0, 4.0, 2.0);
        assert!(check.all_pass());

        let check = TierLadder::check(tier1, 200_000.0, 4.0, 0.06);
        assert!(check.depth_ok && check.spread_ok && !check.vadr_ok);
        assert!(!check.all_pass());
    }
}
