//! Volume-Adjusted Daily Range
//!
//! VADR = (24h_high − 24h_low) / (price × volume_multiple), where
//! volume_multiple = volume_base × price / ADV. A rolling history of
//! observations (one per 5-minute interval over 24h, capacity 288) feeds
//! interpolated percentiles; the worst-feed precedence raises the bar to
//! `max(p80, tier_floor)` in volatile regimes and never drops it below
//! the tier contract.

use std::collections::VecDeque;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::CalcError;
use crate::tiers::LiquidityTier;

/// History capacity: 24h of 5-minute observations
pub const HISTORY_CAPACITY: usize = 288;

/// Samples for the history to count as adequate
pub const ADEQUATE_SAMPLES: usize = 50;

/// Samples for the history to count as excellent
pub const EXCELLENT_SAMPLES: usize = 200;

/// Inputs for one VADR observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct VadrInput {
    /// 24h high price
    pub high_24h: f64,

    /// 24h low price
    pub low_24h: f64,

    /// 24h traded volume, base currency
    pub volume_base: f64,

    /// Average daily volume, USD
    pub adv_usd: f64,

    /// Current price
    pub current_price: f64,
}

/// Percentile block over the rolling history, linear interpolation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VadrPercentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p80: f64,
    pub p90: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl VadrPercentiles {
    /// Fixed synthetic distribution reported while the history is empty.
    /// Never feeds the precedence rule; the tier floor alone governs then.
    pub fn synthetic() -> Self {
        Self {
            p10: 1.20,
            p25: 1.40,
            p50: 1.60,
            p75: 1.78,
            p80: 1.82,
            p90: 1.95,
            p95: 2.10,
            min: 1.00,
            max: 2.40,
            mean: 1.62,
        }
    }
}

/// History adequacy bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAdequacy {
    /// Fewer than 50 samples; sparsity is flagged in the proof bundle
    Insufficient,
    /// At least 50 samples
    Adequate,
    /// At least 200 samples
    Excellent,
}

impl HistoryAdequacy {
    fn from_len(len: usize) -> Self {
        if len >= EXCELLENT_SAMPLES {
            Self::Excellent
        } else if len >= ADEQUATE_SAMPLES {
            Self::Adequate
        } else {
            Self::Insufficient
        }
    }
}

/// One VADR evaluation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VadrResult {
    /// VADR of the current observation
    pub current: f64,

    /// volume_base × price / ADV
    pub volume_multiple: f64,

    /// Percentiles over the history including this observation
    pub percentiles: VadrPercentiles,

    /// The bar the current value was held to
    pub effective_minimum: f64,

    /// current ≥ effective_minimum
    pub passes: bool,

    pub adequacy: HistoryAdequacy,

    /// History length after this observation
    pub history_len: usize,
}

/// Rolling VADR calculator, one per symbol
///
/// Appends are serialized by the owner; the evaluator keys one calculator
/// per symbol inside a mutex-guarded map.
#[derive(Debug, Default)]
pub struct VadrCalculator {
    history: VecDeque<f64>,
}

impl VadrCalculator {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Seed the history, e.g. from persisted prior observations.
    /// NaN/Inf/non-positive values are skipped.
    pub fn with_history(values: impl IntoIterator<Item = f64>) -> Self {
        let mut calc = Self::new();
        for v in values {
            calc.push(v);
        }
        calc
    }

    fn push(&mut self, vadr: f64) {
        if !vadr.is_finite() || vadr <= 0.0 {
            return;
        }
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(vadr);
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Percentiles over the current history; synthetic block when empty
    pub fn percentiles(&self) -> VadrPercentiles {
        if self.history.is_empty() {
            return VadrPercentiles::synthetic();
        }
        let mut sorted: Vec<f64> = self.history.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        VadrPercentiles {
            p10: percentile(&sorted, 10.0),
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p80: percentile(&sorted, 80.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
        }
    }

    /// Evaluate one observation against a tier
    ///
    /// `use_worst_feed` selects the precedence policy: when set, the
    /// effective minimum is `max(p80, tier_floor)` once any history
    /// exists; when clear (or with an empty history), the tier floor
    /// alone governs. The two are never averaged.
    pub fn compute(
        &mut self,
        input: &VadrInput,
        tier: &LiquidityTier,
        use_worst_feed: bool,
    ) -> Result<VadrResult, CalcError> {
        for (field, value) in [
            ("high_24h", input.high_24h),
            ("low_24h", input.low_24h),
            ("volume_base", input.volume_base),
            ("adv_usd", input.adv_usd),
            ("current_price", input.current_price),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(CalcError::NonPositive { field, value });
            }
        }
        if input.high_24h < input.low_24h {
            return Err(CalcError::InvertedRange {
                high: input.high_24h,
                low: input.low_24h,
            });
        }

        let volume_multiple = input.volume_base * input.current_price / input.adv_usd;
        if !(volume_multiple > 0.0) || !volume_multiple.is_finite() {
            return Err(CalcError::ZeroVolumeMultiple(volume_multiple));
        }

        let current = (input.high_24h - input.low_24h) / (input.current_price * volume_multiple);

        let had_history = !self.history.is_empty();
        self.push(current);

        let percentiles = self.percentiles();
        let effective_minimum = if use_worst_feed && had_history {
            percentiles.p80.max(tier.vadr_floor)
        } else {
            tier.vadr_floor
        };

        Ok(VadrResult {
            current,
            volume_multiple,
            percentiles,
            effective_minimum,
            passes: current >= effective_minimum,
            adequacy: HistoryAdequacy::from_len(self.history.len()),
            history_len: self.history.len(),
        })
    }
}

/// Interpolated percentile over an ascending-sorted slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let weight = rank - lo as f64;
    sorted[lo] * (1.0 - weight) + sorted[hi] * weight
}
