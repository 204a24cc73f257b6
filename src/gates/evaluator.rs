//! Tiered gates evaluator
//!
//! Orchestrates one evaluation: resolve the liquidity tier, fan out to the
//! configured venues concurrently, run the spread/depth/VADR gates over
//! the surviving venues, fold in venue health, and emit the verdict plus
//! its proof bundle.
//!
//! Evaluation states: INIT -> RESOLVING_TIER -> GATHERING ->
//! (HEALTHY | DEGRADED | INSUFFICIENT_VENUES) -> EVALUATING_GATES ->
//! (PASS | FAIL). Every terminal state produces a proof bundle; a
//! cancelled evaluation produces none.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    DataQuality, EvalOutcome, GateDetail, GateReport, RecommendedAction, TieredGateResult,
    VenueObservation,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::health::{SizingRecommendation, VenueHealthMonitor, VenueHealthStatus};
use crate::metrics::{depth, vadr};
use crate::metrics::{SpreadCalculator, SpreadStats, VadrCalculator, VadrInput};
use crate::orderbook::{BookQuality, OrderBookSnapshot, SourceMeta};
use crate::proof::{
    proof_id, AuditReport, CmpOp, MicrostructureMetrics, ProofBundle, ProofSink, ValidationProof,
    SCHEMA_VERSION,
};
use crate::tiers::{LiquidityTier, TierLadder};
use crate::venue::{AggregatorGuard, VenueAdapter};

/// One request in a batch scan
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub symbol: String,
    pub adv_usd: f64,
    pub vadr: VadrInput,
}

/// Everything one venue delivered, post-validation
struct VenueMeasurements {
    snapshot: OrderBookSnapshot,
    spread: SpreadStats,
    depth: depth::DepthStats,
    quality_adjusted_depth: f64,
    quality: BookQuality,
}

/// Raw fan-out outcome for one venue
struct VenueFetch {
    venue: String,
    latency_ms: u64,
    outcome: std::result::Result<(crate::venue::L1Quote, crate::venue::L2Book), String>,
}

/// Why a venue contributed nothing to the gates
///
/// An unresponsive venue (transport failure, deadline, staleness) does not
/// count as healthy; a responsive venue whose book fails a calculator
/// (crossed quotes) still does, but is skipped for primary selection.
enum VenueFailure {
    Unresponsive(String),
    Measurement(String),
}

/// The orchestrator; shared across concurrent evaluations behind `Arc`
pub struct GateEvaluator {
    config: EngineConfig,
    ladder: TierLadder,
    guard: Arc<AggregatorGuard>,
    adapters: HashMap<String, Arc<dyn VenueAdapter>>,
    health: Arc<VenueHealthMonitor>,
    sink: Option<Arc<dyn ProofSink>>,

    /// Rolling spread windows keyed by `(symbol, venue)`
    spread_windows: Mutex<HashMap<(String, String), SpreadCalculator>>,

    /// VADR history keyed by symbol
    vadr_history: Mutex<HashMap<String, VadrCalculator>>,
}

impl GateEvaluator {
    pub fn new(
        config: EngineConfig,
        venues: Vec<Arc<dyn VenueAdapter>>,
        guard: Arc<AggregatorGuard>,
        health: Arc<VenueHealthMonitor>,
        sink: Option<Arc<dyn ProofSink>>,
    ) -> Result<Self> {
        let ladder = config
            .validate()
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let adapters: HashMap<String, Arc<dyn VenueAdapter>> = venues
            .into_iter()
            .map(|a| (a.venue().to_lowercase(), a))
            .collect();

        Ok(Self {
            config,
            ladder,
            guard,
            adapters,
            health,
            sink,
            spread_windows: Mutex::new(HashMap::new()),
            vadr_history: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate execution feasibility for `(symbol, adv)` across the
    /// configured venues
    pub async fn evaluate(
        &self,
        symbol: &str,
        adv_usd: f64,
        vadr_input: &VadrInput,
        cancel: &CancellationToken,
    ) -> Result<TieredGateResult> {
        let started = Instant::now();
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(EngineError::InvalidInput("empty symbol".to_string()));
        }
        if adv_usd < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "negative ADV: {adv_usd}"
            )));
        }

        // provenance check over every venue this evaluation may touch
        for venue in &self.config.venue_priority {
            self.guard.check_source(venue)?;
            if let Some(adapter) = self.adapters.get(&venue.to_lowercase()) {
                self.guard.check_source(adapter.venue())?;
            }
        }

        debug!(symbol = %symbol, phase = "resolving_tier", adv_usd, "starting evaluation");
        let tier_match = self
            .ladder
            .resolve(adv_usd)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        let tier = tier_match.tier.clone();
        let below_minimum = tier_match.below_minimum;

        debug!(symbol = %symbol, phase = "gathering", tier = %tier.name, "fanning out to venues");
        let fetches = tokio::select! {
            _ = cancel.cancelled() => {
                info!(symbol = %symbol, "evaluation cancelled during venue gather");
                return Err(EngineError::Cancelled);
            }
            fetches = self.gather_venues(&symbol) => fetches,
        };
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let now = Utc::now();
        let mut warnings: Vec<String> = Vec::new();
        let mut critical_failures: Vec<String> = Vec::new();
        let mut failure_reasons: Vec<String> = Vec::new();

        if below_minimum {
            warnings.push(format!(
                "ADV ${adv_usd:.0} below all tiers, applying {} thresholds",
                tier.name
            ));
        }

        // turn raw fetches into per-venue observations and measurements
        let mut venue_results: BTreeMap<String, VenueObservation> = BTreeMap::new();
        let mut measurements: Vec<(String, VenueMeasurements)> = Vec::new();
        let mut healthy_count = 0usize;
        for fetch in fetches {
            match self.measure_venue(&symbol, &fetch, now) {
                Ok(m) => {
                    healthy_count += 1;
                    venue_results.insert(
                        fetch.venue.clone(),
                        VenueObservation {
                            venue: fetch.venue.clone(),
                            available: true,
                            error: None,
                            latency_ms: fetch.latency_ms,
                            data_age_ms: Some(now
                                .signed_duration_since(m.snapshot.captured_at)
                                .num_milliseconds()),
                            quality: Some(m.quality),
                            spread_bps: Some(effective_spread(&m.spread)),
                            depth_usd: Some(m.depth.total_depth_usd),
                            quality_adjusted_depth_usd: Some(m.quality_adjusted_depth),
                            gate_check: None, // filled once VADR is known
                        },
                    );
                    measurements.push((fetch.venue.clone(), m));
                }
                Err(VenueFailure::Unresponsive(reason)) => {
                    warn!(symbol = %symbol, venue = %fetch.venue, %reason, "venue unavailable");
                    failure_reasons.push(format!("{}: {}", fetch.venue, reason));
                    venue_results.insert(
                        fetch.venue.clone(),
                        VenueObservation::unavailable(&fetch.venue, fetch.latency_ms, reason),
                    );
                }
                Err(VenueFailure::Measurement(reason)) => {
                    // the venue answered; its book just cannot be measured
                    healthy_count += 1;
                    warn!(symbol = %symbol, venue = %fetch.venue, %reason, "venue measurement failed");
                    failure_reasons.push(format!("{}: {}", fetch.venue, reason));
                    let mut obs =
                        VenueObservation::unavailable(&fetch.venue, fetch.latency_ms, reason);
                    obs.available = true;
                    venue_results.insert(fetch.venue.clone(), obs);
                }
            }
        }

        let degraded_mode = healthy_count == 1;
        let phase = match healthy_count {
            0 => "insufficient_venues",
            1 => "degraded",
            _ => "healthy",
        };
        debug!(
            symbol = %symbol,
            phase,
            healthy_count,
            measurable = measurements.len(),
            "venue gather complete"
        );

        if healthy_count < self.config.required_venues {
            let err = EngineError::InsufficientHealthyVenues {
                healthy: healthy_count,
                required: self.config.required_venues,
            };
            critical_failures.push(err.to_string());
            failure_reasons.push(err.to_string());
        }

        // primary = first available venue in priority order
        let mut primary_venue: Option<String> = None;
        let mut fallbacks_used: Vec<String> = Vec::new();
        for venue in &self.config.venue_priority {
            let venue = venue.to_lowercase();
            if measurements.iter().any(|(v, _)| *v == venue) {
                if primary_venue.is_none() {
                    primary_venue = Some(venue);
                } else {
                    fallbacks_used.push(venue);
                }
            }
        }

        debug!(symbol = %symbol, phase = "evaluating_gates", primary = ?primary_venue, "running gates");

        // depth gate: best quality-adjusted depth across venues
        let depth_measurement = measurements
            .iter()
            .map(|(_, m)| m.quality_adjusted_depth)
            .fold(None, |best: Option<f64>, d| {
                Some(best.map_or(d, |b| b.max(d)))
            });
        let depth_ok = depth_measurement
            .map(|d| d >= tier.depth_floor_usd)
            .unwrap_or(false);
        if let Some(d) = depth_measurement {
            if !depth_ok {
                failure_reasons.push(format!(
                    "depth ${:.0} below {} floor ${:.0}",
                    d, tier.name, tier.depth_floor_usd
                ));
            }
        }

        // spread gate: tightest rolling average across venues
        let venue_spreads: Vec<f64> = measurements
            .iter()
            .map(|(_, m)| effective_spread(&m.spread))
            .collect();
        let spread_measurement = venue_spreads.iter().copied().reduce(f64::min);
        let spread_ok = spread_measurement
            .map(|s| s <= tier.spread_cap_bps)
            .unwrap_or(false);
        if let Some(s) = spread_measurement {
            if !spread_ok {
                failure_reasons.push(format!(
                    "spread {:.2} bps exceeds {} cap {:.2} bps",
                    s, tier.name, tier.spread_cap_bps
                ));
            }
        }

        let spread_divergence = match (
            venue_spreads.iter().copied().reduce(f64::max),
            spread_measurement,
        ) {
            (Some(max), Some(min)) if venue_spreads.len() > 1 => Some(max - min),
            _ => None,
        };
        if let Some(div) = spread_divergence {
            if div > self.config.spread_tolerance_bps {
                warnings.push(format!(
                    "cross-venue spread divergence {:.2} bps exceeds tolerance {:.2} bps",
                    div, self.config.spread_tolerance_bps
                ));
            }
        }

        // VADR gate with the worst-feed precedence policy
        let vadr_outcome = {
            let mut history = match self.vadr_history.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            history
                .entry(symbol.clone())
                .or_insert_with(VadrCalculator::new)
                .compute(vadr_input, &tier, self.config.use_worst_feed_vadr)
        };
        let (vadr_result, vadr_ok) = match vadr_outcome {
            Ok(result) => {
                if !result.passes {
                    failure_reasons.push(format!(
                        "vadr {:.4} below effective minimum {:.4}",
                        result.current, result.effective_minimum
                    ));
                }
                if result.adequacy == vadr::HistoryAdequacy::Insufficient {
                    warnings.push(format!(
                        "vadr history sparse ({} samples), tier floor governs",
                        result.history_len
                    ));
                }
                let ok = result.passes;
                (Some(result), ok)
            }
            Err(e) => {
                failure_reasons.push(format!("calculation_failure: {e}"));
                (None, false)
            }
        };

        // per-venue sub-results against the tier now that VADR is known
        let vadr_current = vadr_result.as_ref().map(|r| r.current).unwrap_or(0.0);
        for (venue, m) in &measurements {
            if let Some(obs) = venue_results.get_mut(venue) {
                obs.gate_check = Some(TierLadder::check(
                    &tier,
                    m.quality_adjusted_depth,
                    effective_spread(&m.spread),
                    vadr_current,
                ));
            }
        }

        let overall_pass = critical_failures.is_empty() && depth_ok && spread_ok && vadr_ok;
        let outcome = if healthy_count < self.config.required_venues {
            EvalOutcome::InsufficientVenues
        } else if overall_pass {
            EvalOutcome::Pass
        } else {
            EvalOutcome::Fail
        };

        // primary venue health feeds the sizing decision
        let venue_health: Option<VenueHealthStatus> = primary_venue
            .as_deref()
            .map(|v| self.health.observe_health_at(v, now));

        let recommended_action = if !critical_failures.is_empty() || !overall_pass {
            RecommendedAction::Defer
        } else if degraded_mode {
            RecommendedAction::HalveSize
        } else {
            match venue_health.as_ref().map(|h| h.recommendation) {
                Some(SizingRecommendation::HalveSize) => RecommendedAction::HalveSize,
                Some(SizingRecommendation::Avoid) => RecommendedAction::Defer,
                _ => RecommendedAction::Proceed,
            }
        };

        let primary_measurements = primary_venue
            .as_ref()
            .and_then(|p| measurements.iter().find(|(v, _)| v == p))
            .map(|(_, m)| m);

        let (quality_score, quality_label) = match primary_measurements {
            Some(m) => data_quality_score(m, now),
            None => (0, DataQuality::Degraded),
        };

        let detail = GateDetail {
            tier: tier.name.clone(),
            tier_below_minimum: below_minimum,
            spread_bps: spread_measurement,
            spread_cap_bps: tier.spread_cap_bps,
            spread_divergence_bps: spread_divergence,
            depth_usd: depth_measurement,
            depth_floor_usd: tier.depth_floor_usd,
            vadr: vadr_result.as_ref().map(|r| r.current),
            vadr_effective_min: vadr_result
                .as_ref()
                .map(|r| r.effective_minimum)
                .unwrap_or(tier.vadr_floor),
        };

        let captured_at = primary_measurements
            .map(|m| m.snapshot.captured_at)
            .unwrap_or(now);

        let report = GateReport {
            symbol: symbol.clone(),
            venue: primary_venue.clone(),
            captured_at,
            depth_ok,
            spread_ok,
            vadr_ok,
            detail,
            venue_health,
            execution_feasible: overall_pass,
            recommended_action,
            failure_reasons: failure_reasons.clone(),
        };

        let result = TieredGateResult {
            report,
            venue_results,
            primary_venue: primary_venue.clone(),
            fallbacks_used,
            degraded_mode,
            critical_failures: critical_failures.clone(),
            warnings,
            outcome,
            processing_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            symbol = %symbol,
            phase = if overall_pass { "pass" } else { "fail" },
            outcome = ?outcome,
            action = ?recommended_action,
            primary = ?primary_venue,
            degraded = degraded_mode,
            latency_ms = result.processing_ms,
            "evaluation complete"
        );

        // every terminal state leaves a proof bundle behind
        let bundle = self.build_bundle(
            &result,
            &tier,
            primary_measurements,
            vadr_result.as_ref(),
            quality_score,
            quality_label,
            now,
        );
        if let Some(sink) = &self.sink {
            sink.write_bundle(&bundle)?;
        }

        Ok(result)
    }

    /// Evaluate a set of symbols and write the batch audit report
    ///
    /// Individual failures are logged and skipped; cancellation aborts the
    /// whole batch.
    pub async fn evaluate_batch(
        &self,
        requests: &[BatchRequest],
        cancel: &CancellationToken,
    ) -> Result<(Vec<TieredGateResult>, AuditReport)> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            match self
                .evaluate(&request.symbol, request.adv_usd, &request.vadr, cancel)
                .await
            {
                Ok(result) => results.push(result),
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) => {
                    warn!(symbol = %request.symbol, error = %e, "skipping symbol in batch");
                }
            }
        }

        let report = AuditReport::from_results(&results, Utc::now());
        if let Some(sink) = &self.sink {
            sink.write_audit(&report)?;
        }
        Ok((results, report))
    }

    /// Fan out to all priority venues concurrently
    async fn gather_venues(&self, symbol: &str) -> Vec<VenueFetch> {
        let deadline = std::time::Duration::from_secs(self.config.max_venue_age_seconds);

        let futures = self.config.venue_priority.iter().map(|venue| {
            let venue = venue.to_lowercase();
            let adapter = self.adapters.get(&venue).cloned();
            let symbol = symbol.to_string();
            let health = Arc::clone(&self.health);
            async move {
                let Some(adapter) = adapter else {
                    return VenueFetch {
                        venue: venue.clone(),
                        latency_ms: 0,
                        outcome: Err("invalid_input: no adapter registered".to_string()),
                    };
                };

                let t0 = Instant::now();
                let fetched = tokio::time::timeout(deadline, async {
                    let l1 = adapter.get_l1(&symbol).await?;
                    let l2 = adapter.get_l2(&symbol).await?;
                    Ok::<_, crate::venue::VenueError>((l1, l2))
                })
                .await;
                let latency_ms = t0.elapsed().as_millis() as u64;

                let outcome = match fetched {
                    Ok(Ok(data)) => {
                        health.record_request(
                            &venue,
                            "market_data",
                            latency_ms,
                            true,
                            Some(200),
                            None,
                        );
                        Ok(data)
                    }
                    Ok(Err(e)) => {
                        health.record_request(
                            &venue,
                            "market_data",
                            latency_ms,
                            false,
                            None,
                            Some(e.code()),
                        );
                        Err(format!("{}: {}", e.code(), e))
                    }
                    Err(_) => {
                        health.record_request(
                            &venue,
                            "market_data",
                            latency_ms,
                            false,
                            None,
                            Some("transport_error"),
                        );
                        Err(format!(
                            "transport_error: venue deadline {}s exceeded",
                            deadline.as_secs()
                        ))
                    }
                };

                VenueFetch {
                    venue,
                    latency_ms,
                    outcome,
                }
            }
        });

        join_all(futures).await
    }

    /// Validate one venue's response and compute its measurements
    fn measure_venue(
        &self,
        symbol: &str,
        fetch: &VenueFetch,
        now: DateTime<Utc>,
    ) -> std::result::Result<VenueMeasurements, VenueFailure> {
        let (l1, l2) = match &fetch.outcome {
            Ok(data) => data,
            Err(reason) => return Err(VenueFailure::Unresponsive(reason.clone())),
        };

        if fetch.latency_ms as f64 > self.config.latency_threshold_ms {
            return Err(VenueFailure::Unresponsive(format!(
                "venue_unavailable: latency {}ms exceeds {}ms",
                fetch.latency_ms, self.config.latency_threshold_ms
            )));
        }

        let max_age_ms = self.config.max_data_age_seconds as i64 * 1000;
        if l1.data_age_ms > max_age_ms {
            return Err(VenueFailure::Unresponsive(format!(
                "stale_data: age {}ms exceeds cap {}ms",
                l1.data_age_ms, max_age_ms
            )));
        }
        if !l1.usd_quote || !l2.usd_quote {
            return Err(VenueFailure::Unresponsive(format!(
                "non_usd_quote: {symbol}"
            )));
        }

        // degraded books still count, but their depth gets discounted
        let quality = worst_quality(l1.quality, l2.quality);

        let snapshot = OrderBookSnapshot {
            venue: fetch.venue.clone(),
            symbol: symbol.to_string(),
            captured_at: now - Duration::milliseconds(l1.data_age_ms.max(0)),
            last_price: l1.last_price,
            bids: l2.bids.clone(),
            asks: l2.asks.clone(),
            source: SourceMeta {
                sequence: l2.sequence,
                stale: l1.data_age_ms > max_age_ms,
                quality,
            },
        };
        snapshot
            .validate_at(
                self.config.min_book_levels,
                Duration::seconds(self.config.max_data_age_seconds as i64),
                now,
            )
            .map_err(|e| VenueFailure::Measurement(format!("calculation_failure: {e}")))?;

        let spread_stats = {
            use rust_decimal::prelude::ToPrimitive;
            let mut windows = match self.spread_windows.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            windows
                .entry((symbol.to_string(), fetch.venue.clone()))
                .or_insert_with(|| SpreadCalculator::new(self.config.spread_window_seconds))
                .observe_at(
                    l1.bid_price.to_f64().unwrap_or(0.0),
                    l1.ask_price.to_f64().unwrap_or(0.0),
                    snapshot.captured_at,
                )
                .map_err(|e| VenueFailure::Measurement(format!("calculation_failure: {e}")))?
        };

        let depth_stats = depth::compute(&snapshot)
            .map_err(|e| VenueFailure::Measurement(format!("calculation_failure: {e}")))?;
        let multiplier = self.config.depth_quality_multipliers.for_quality(quality);

        Ok(VenueMeasurements {
            quality_adjusted_depth: depth_stats.total_depth_usd * multiplier,
            snapshot,
            spread: spread_stats,
            depth: depth_stats,
            quality,
        })
    }

    /// Assemble the proof bundle for a finished evaluation
    #[allow(clippy::too_many_arguments)]
    fn build_bundle(
        &self,
        result: &TieredGateResult,
        tier: &LiquidityTier,
        primary: Option<&VenueMeasurements>,
        vadr_result: Option<&vadr::VadrResult>,
        quality_score: u8,
        quality_label: DataQuality,
        now: DateTime<Utc>,
    ) -> ProofBundle {
        let detail = &result.report.detail;

        let spread_proof = match detail.spread_bps {
            Some(actual) => ValidationProof::new(
                "spread_bps",
                actual,
                tier.spread_cap_bps,
                CmpOp::Le,
                format!(
                    "tightest rolling spread {:.2} bps across {} venue(s) against {} cap {:.2} bps",
                    actual,
                    result
                        .venue_results
                        .values()
                        .filter(|v| v.spread_bps.is_some())
                        .count(),
                    tier.name,
                    tier.spread_cap_bps
                ),
            ),
            None => ValidationProof::failed(
                "spread_bps",
                tier.spread_cap_bps,
                CmpOp::Le,
                "no venue supplied spread data".to_string(),
            ),
        };

        let depth_proof = match detail.depth_usd {
            Some(actual) => ValidationProof::new(
                "depth_usd",
                actual,
                tier.depth_floor_usd,
                CmpOp::Ge,
                format!(
                    "best quality-adjusted depth ${:.0} within \u{b1}2% against {} floor ${:.0}",
                    actual, tier.name, tier.depth_floor_usd
                ),
            ),
            None => ValidationProof::failed(
                "depth_usd",
                tier.depth_floor_usd,
                CmpOp::Ge,
                "no venue supplied depth data".to_string(),
            ),
        };

        let vadr_proof = match vadr_result {
            Some(v) => ValidationProof::new(
                "vadr",
                v.current,
                v.effective_minimum,
                CmpOp::Ge,
                format!(
                    "vadr {:.4} against effective minimum {:.4} (p80 {:.4}, {} floor {:.2}, {} samples)",
                    v.current,
                    v.effective_minimum,
                    v.percentiles.p80,
                    tier.name,
                    tier.vadr_floor,
                    v.history_len
                ),
            ),
            None => ValidationProof::failed(
                "vadr",
                tier.vadr_floor,
                CmpOp::Ge,
                result
                    .report
                    .failure_reasons
                    .iter()
                    .find(|r| r.starts_with("calculation_failure"))
                    .cloned()
                    .unwrap_or_else(|| "vadr not computed".to_string()),
            ),
        };

        ProofBundle {
            schema_version: SCHEMA_VERSION,
            asset_symbol: result.report.symbol.clone(),
            timestamp_mono: result.report.captured_at.timestamp_millis(),
            proven_valid: result.report.execution_feasible,
            order_book_snapshot: primary.map(|m| m.snapshot.clone()),
            microstructure_metrics: MicrostructureMetrics {
                spread: primary.map(|m| m.spread.clone()),
                depth: primary.map(|m| m.depth.clone()),
                quality_adjusted_depth_usd: primary.map(|m| m.quality_adjusted_depth),
                vadr: vadr_result.cloned(),
                data_quality_score: quality_score,
                data_quality: format!("{quality_label:?}").to_lowercase(),
                venues_available: result
                    .venue_results
                    .values()
                    .filter(|v| v.available)
                    .count(),
            },
            venue_used: result.primary_venue.clone(),
            spread_proof,
            depth_proof,
            vadr_proof,
            failure_reasons: result.report.failure_reasons.clone(),
            proof_generated_at: now,
            proof_id: proof_id(&result.report.symbol, now),
        }
    }
}

/// Rolling average with a single-sample fallback
fn effective_spread(stats: &SpreadStats) -> f64 {
    if stats.sample_count <= 1 {
        stats.spread_bps
    } else {
        stats.rolling_avg_bps
    }
}

fn worst_quality(a: BookQuality, b: BookQuality) -> BookQuality {
    fn rank(q: BookQuality) -> u8 {
        match q {
            BookQuality::Full => 0,
            BookQuality::Partial => 1,
            BookQuality::Degraded => 2,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

/// Composite 0..5 data-quality score for the primary venue
///
/// One point each: fresh data (< 2s), full book, >= 20 total levels,
/// stable spread (sigma < 5 bps), balanced book (bid share in [0.3, 0.7]).
fn data_quality_score(m: &VenueMeasurements, now: DateTime<Utc>) -> (u8, DataQuality) {
    let mut score = 0u8;

    if now.signed_duration_since(m.snapshot.captured_at) < Duration::seconds(2) {
        score += 1;
    }
    if m.quality == BookQuality::Full {
        score += 1;
    }
    if m.snapshot.bids.len() + m.snapshot.asks.len() >= 20 {
        score += 1;
    }
    if m.spread.std_dev_bps < 5.0 {
        score += 1;
    }
    let total = m.depth.total_depth_usd;
    if total > 0.0 {
        let balance = m.depth.bid_depth_usd / total;
        if (0.3..=0.7).contains(&balance) {
            score += 1;
        }
    }

    (score, DataQuality::from_score(score))
}
