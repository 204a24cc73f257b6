//! Proof artifact sinks
//!
//! Bundles land under `<root>/proofs/<YYYY-MM-DD>/microstructure/`, one
//! file per symbol, overwritten by subsequent evaluations; the dated
//! directory is the time partition. Batch audit reports aggregate a
//! scan's results under `<root>/proofs/<YYYY-MM-DD>/reports/`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ProofBundle, ProofError};
use crate::gates::TieredGateResult;

/// Pluggable destination for proof artifacts
pub trait ProofSink: Send + Sync {
    /// Persist one bundle; returns the artifact's location
    fn write_bundle(&self, bundle: &ProofBundle) -> Result<PathBuf, ProofError>;

    /// Persist a batch audit report; returns the artifact's location
    fn write_audit(&self, report: &AuditReport) -> Result<PathBuf, ProofError>;
}

/// Per-venue aggregate row in a batch audit
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct VenueAuditStats {
    /// Evaluations in which the venue supplied usable data
    pub evaluations: usize,

    /// Evaluations in which the venue's own measurements passed the tier
    pub passes: usize,

    pub pass_rate_pct: f64,

    /// Mean rolling-average spread across its appearances, bps
    pub mean_spread_bps: f64,

    /// Mean quality-adjusted depth across its appearances, USD
    pub mean_depth_usd: f64,
}

/// Per-symbol row in a batch audit
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetSummary {
    pub symbol: String,

    pub eligible: bool,

    pub recommended_action: crate::gates::RecommendedAction,

    pub primary_venue: Option<String>,

    pub spread_bps: Option<f64>,

    pub depth_usd: Option<f64>,

    pub vadr: Option<f64>,
}

/// Aggregated audit over a set of evaluations
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,

    pub total_assets: usize,

    /// Assets whose evaluation was execution-feasible
    pub eligible_assets: usize,

    pub eligibility_rate_pct: f64,

    /// Keyed by venue identifier
    pub venue_stats: BTreeMap<String, VenueAuditStats>,

    pub asset_summaries: Vec<AssetSummary>,
}

impl AuditReport {
    /// Aggregate a batch of evaluation results
    pub fn from_results(results: &[TieredGateResult], generated_at: DateTime<Utc>) -> Self {
        let total = results.len();
        let eligible = results
            .iter()
            .filter(|r| r.report.execution_feasible)
            .count();

        let mut venue_stats: BTreeMap<String, VenueAuditStats> = BTreeMap::new();
        // (sum, count) pairs; venues can be available yet unmeasured
        let mut spreads: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        let mut depths: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for result in results {
            for (venue, obs) in &result.venue_results {
                if !obs.available {
                    continue;
                }
                let stats = venue_stats.entry(venue.clone()).or_default();
                stats.evaluations += 1;
                if obs.gate_check.map(|c| c.all_pass()).unwrap_or(false) {
                    stats.passes += 1;
                }
                if let Some(s) = obs.spread_bps {
                    let entry = spreads.entry(venue.clone()).or_default();
                    entry.0 += s;
                    entry.1 += 1;
                }
                if let Some(d) = obs.quality_adjusted_depth_usd {
                    let entry = depths.entry(venue.clone()).or_default();
                    entry.0 += d;
                    entry.1 += 1;
                }
            }
        }

        for (venue, stats) in venue_stats.iter_mut() {
            stats.pass_rate_pct = stats.passes as f64 / stats.evaluations as f64 * 100.0;
            if let Some((sum, n)) = spreads.get(venue) {
                stats.mean_spread_bps = *sum / *n as f64;
            }
            if let Some((sum, n)) = depths.get(venue) {
                stats.mean_depth_usd = *sum / *n as f64;
            }
        }

        let asset_summaries = results
            .iter()
            .map(|r| AssetSummary {
                symbol: r.report.symbol.clone(),
                eligible: r.report.execution_feasible,
                recommended_action: r.report.recommended_action,
                primary_venue: r.primary_venue.clone(),
                spread_bps: r.report.detail.spread_bps,
                depth_usd: r.report.detail.depth_usd,
                vadr: r.report.detail.vadr,
            })
            .collect();

        Self {
            generated_at,
            total_assets: total,
            eligible_assets: eligible,
            eligibility_rate_pct: if total == 0 {
                0.0
            } else {
                eligible as f64 / total as f64 * 100.0
            },
            venue_stats,
            asset_summaries,
        }
    }
}

/// Filesystem sink rooted at a data directory
#[derive(Debug, Clone)]
pub struct FileProofSink {
    root: PathBuf,
}

impl FileProofSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dated_dir(&self, at: DateTime<Utc>, leaf: &str) -> PathBuf {
        self.root
            .join("proofs")
            .join(at.format("%Y-%m-%d").to_string())
            .join(leaf)
    }
}

impl ProofSink for FileProofSink {
    fn write_bundle(&self, bundle: &ProofBundle) -> Result<PathBuf, ProofError> {
        let dir = self.dated_dir(bundle.proof_generated_at, "microstructure");
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let path = dir.join(format!(
            "{}_master_proof.json",
            bundle.asset_symbol.to_uppercase()
        ));
        let json = serde_json::to_vec_pretty(bundle)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;

        debug!(
            path = %path.display(),
            proof_id = %bundle.proof_id,
            proven_valid = bundle.proven_valid,
            "wrote proof bundle"
        );
        Ok(path)
    }

    fn write_audit(&self, report: &AuditReport) -> Result<PathBuf, ProofError> {
        let dir = self.dated_dir(report.generated_at, "reports");
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let path = dir.join(format!(
            "microstructure_audit_{}.json",
            report.generated_at.format("%H%M%S")
        ));
        let json = serde_json::to_vec_pretty(report)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;

        info!(
            path = %path.display(),
            total = report.total_assets,
            eligible = report.eligible_assets,
            "wrote batch audit report"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{proof_id, CmpOp, MicrostructureMetrics, ValidationProof, SCHEMA_VERSION};

    fn bundle(symbol: &str, valid: bool) -> ProofBundle {
        let now = Utc::now();
        ProofBundle {
            schema_version: SCHEMA_VERSION,
            asset_symbol: symbol.to_string(),
            timestamp_mono: now.timestamp_millis(),
            proven_valid: valid,
            order_book_snapshot: None,
            microstructure_metrics: MicrostructureMetrics::default(),
            venue_used: Some("binance".to_string()),
            spread_proof: ValidationProof::new("spread_bps", 4.0, 25.0, CmpOp::Le, "ok".into()),
            depth_proof: ValidationProof::new(
                "depth_usd",
                200_000.0,
                150_000.0,
                CmpOp::Ge,
                "ok".into(),
            ),
            vadr_proof: ValidationProof::new("vadr", 2.0, 1.85, CmpOp::Ge, "ok".into()),
            failure_reasons: Vec::new(),
            proof_generated_at: now,
            proof_id: proof_id(symbol, now),
        }
    }

    #[test]
    fn test_bundle_lands_in_dated_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileProofSink::new(tmp.path());

        let b = bundle("BTCUSDT", true);
        let path = sink.write_bundle(&b).unwrap();

        let expected = tmp
            .path()
            .join("proofs")
            .join(b.proof_generated_at.format("%Y-%m-%d").to_string())
            .join("microstructure")
            .join("BTCUSDT_master_proof.json");
        assert_eq!(path, expected);
        assert!(path.exists());

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: ProofBundle = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.asset_symbol, "BTCUSDT");
        assert_eq!(parsed.schema_version, SCHEMA_VERSION);
        assert!(parsed.proven_valid);
    }

    #[test]
    fn test_bundle_overwritten_per_symbol() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileProofSink::new(tmp.path());

        let first = bundle("ETHUSDT", false);
        let second = bundle("ETHUSDT", true);
        let p1 = sink.write_bundle(&first).unwrap();
        let p2 = sink.write_bundle(&second).unwrap();
        assert_eq!(p1, p2);

        let parsed: ProofBundle =
            serde_json::from_str(&fs::read_to_string(&p2).unwrap()).unwrap();
        assert!(parsed.proven_valid, "second write must win");
    }

    #[test]
    fn test_audit_report_aggregation_empty() {
        let report = AuditReport::from_results(&[], Utc::now());
        assert_eq!(report.total_assets, 0);
        assert_eq!(report.eligibility_rate_pct, 0.0);
        assert!(report.venue_stats.is_empty());
    }

    #[test]
    fn test_audit_written_under_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileProofSink::new(tmp.path());

        let report = AuditReport::from_results(&[], Utc::now());
        let path = sink.write_audit(&report).unwrap();
        assert!(path.to_string_lossy().contains("reports"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("microstructure_audit_"));
        assert!(path.exists());
    }
}
