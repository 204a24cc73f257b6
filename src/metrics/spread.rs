//! Rolling spread statistics
//!
//! Maintains a capped window of best bid/ask observations per
//! `(symbol, venue)` and derives mean, extrema, and dispersion of the
//! spread in basis points. Sample rate classifies the window's data
//! quality.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::CalcError;
use crate::tiers::LiquidityTier;

/// Floor on the buffer capacity regardless of window length
const MIN_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy)]
struct SpreadSample {
    at: DateTime<Utc>,
    spread_bps: f64,
}

/// Window data quality by sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SampleQuality {
    /// >= 0.5 samples/sec
    Excellent,
    /// >= 0.1 samples/sec
    Good,
    /// anything slower
    Sparse,
}

impl SampleQuality {
    fn from_rate(samples_per_sec: f64) -> Self {
        if samples_per_sec >= 0.5 {
            Self::Excellent
        } else if samples_per_sec >= 0.1 {
            Self::Good
        } else {
            Self::Sparse
        }
    }
}

/// Windowed spread statistics
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SpreadStats {
    /// Spread of the triggering observation, basis points
    pub spread_bps: f64,

    /// Mean spread over the window
    pub rolling_avg_bps: f64,

    pub min_bps: f64,
    pub max_bps: f64,

    /// Population standard deviation over the window
    pub std_dev_bps: f64,

    /// Observations retained in the window
    pub sample_count: usize,

    /// Observation rate over the window
    pub samples_per_sec: f64,

    pub quality: SampleQuality,
}

/// Rolling calculator over one venue's best bid/ask feed
///
/// Appends are serialized by the owner (the evaluator keys one calculator
/// per `(symbol, venue)` inside a mutex-guarded map); eviction runs on
/// each append.
#[derive(Debug)]
pub struct SpreadCalculator {
    window: Duration,
    capacity: usize,
    samples: VecDeque<SpreadSample>,
}

impl SpreadCalculator {
    pub fn new(window_seconds: u32) -> Self {
        let capacity = (2 * window_seconds as usize).max(MIN_CAPACITY);
        Self {
            window: Duration::seconds(window_seconds as i64),
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Record one best bid/ask observation and return window statistics
    ///
    /// Fails with `CrossedOrInvalidBook` on non-positive or crossed quotes;
    /// nothing is appended in that case.
    pub fn observe_at(
        &mut self,
        bid: f64,
        ask: f64,
        now: DateTime<Utc>,
    ) -> Result<SpreadStats, CalcError> {
        if bid <= 0.0 || ask <= 0.0 || ask <= bid {
            return Err(CalcError::CrossedOrInvalidBook { bid, ask });
        }

        let mid = (bid + ask) / 2.0;
        let spread_bps = (ask - bid) / mid * 10_000.0;

        self.samples.push_back(SpreadSample {
            at: now,
            spread_bps,
        });
        self.evict(now);

        Ok(self.stats(spread_bps))
    }

    /// Record against the current wall clock
    pub fn observe(&mut self, bid: f64, ask: f64) -> Result<SpreadStats, CalcError> {
        self.observe_at(bid, ask, Utc::now())
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while let Some(front) = self.samples.front() {
            if front.at < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    fn stats(&self, current_bps: f64) -> SpreadStats {
        let n = self.samples.len();
        let spreads = self.samples.iter().map(|s| s.spread_bps);

        let sum: f64 = spreads.clone().sum();
        let mean = sum / n as f64;
        let min = spreads.clone().fold(f64::INFINITY, f64::min);
        let max = spreads.clone().fold(f64::NEG_INFINITY, f64::max);
        let variance = spreads.map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;

        let samples_per_sec = n as f64 / self.window.num_seconds().max(1) as f64;

        SpreadStats {
            spread_bps: current_bps,
            rolling_avg_bps: mean,
            min_bps: min,
            max_bps: max,
            std_dev_bps: variance.sqrt(),
            sample_count: n,
            samples_per_sec,
            quality: SampleQuality::from_rate(samples_per_sec),
        }
    }

    /// Number of samples currently retained
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Spread gate: rolling average against the tier cap
///
/// With a single sample the rolling average equals the current sample, so
/// the fallback is implicit.
pub fn validate(stats: &SpreadStats, tier: &LiquidityTier) -> bool {
    let measured = if stats.sample_count <= 1 {
        stats.spread_bps
    } else {
        stats.rolling_avg_bps
    };
    measured <= tier.spread_cap_bps
}
