//! Aggregator guard
//!
//! Enforces the exchange-native-only data provenance policy. Any source
//! identifier or endpoint path matching the banlist is rejected: strict
//! mode makes the violation fatal to the evaluation, audit mode records it
//! in an append-only log and returns the violation to the caller.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Banned source tokens; substring match, case-insensitive
pub const BANNED_SOURCES: [&str; 9] = [
    "coingecko",
    "dexscreener",
    "coinmarketcap",
    "coinpaprika",
    "cryptocompare",
    "nomics",
    "aggregated",
    "composite",
    "weighted",
];

/// Tokens scanned for inside endpoint path segments
const BANNED_PATH_SEGMENTS: [&str; 3] = ["aggregated", "composite", "weighted"];

/// A recorded provenance violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardViolation {
    /// Offending identifier or endpoint path, as given
    pub source: String,

    /// Banlist token that matched
    pub matched: String,

    /// When the violation was observed
    pub observed_at: DateTime<Utc>,
}

impl std::fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "source '{}' matched banned token '{}'",
            self.source, self.matched
        )
    }
}

impl std::error::Error for GuardViolation {}

/// Guard operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// A violation halts the evaluation with a fatal error
    Strict,

    /// A violation is logged and returned without halting the process
    Audit,
}

/// Provenance guard with a static banlist and runtime extensions
pub struct AggregatorGuard {
    mode: GuardMode,
    runtime_bans: Vec<String>,
    violations: Mutex<Vec<GuardViolation>>,
}

impl AggregatorGuard {
    pub fn new(mode: GuardMode) -> Self {
        Self {
            mode,
            runtime_bans: Vec::new(),
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Strict-mode guard with the static banlist only
    pub fn strict() -> Self {
        Self::new(GuardMode::Strict)
    }

    /// Audit-mode guard with the static banlist only
    pub fn audit() -> Self {
        Self::new(GuardMode::Audit)
    }

    /// Extend the banlist at runtime (stored lowercase)
    pub fn with_runtime_ban(mut self, token: &str) -> Self {
        self.runtime_bans.push(token.to_lowercase());
        self
    }

    pub fn mode(&self) -> GuardMode {
        self.mode
    }

    fn matched_token(&self, identifier: &str) -> Option<String> {
        let lowered = identifier.to_lowercase();
        BANNED_SOURCES
            .iter()
            .find(|token| lowered.contains(*token))
            .map(|t| t.to_string())
            .or_else(|| {
                self.runtime_bans
                    .iter()
                    .find(|token| lowered.contains(token.as_str()))
                    .cloned()
            })
    }

    /// Check a source identifier against the banlist
    ///
    /// Returns the violation on a match; in audit mode the violation is
    /// also appended to the process-wide violation log.
    pub fn check_source(&self, identifier: &str) -> Result<(), GuardViolation> {
        match self.matched_token(identifier) {
            None => Ok(()),
            Some(matched) => {
                let violation = GuardViolation {
                    source: identifier.to_string(),
                    matched,
                    observed_at: Utc::now(),
                };
                match self.mode {
                    GuardMode::Strict => {
                        error!(
                            source = %violation.source,
                            matched = %violation.matched,
                            "aggregator ban violation (strict)"
                        );
                    }
                    GuardMode::Audit => {
                        warn!(
                            source = %violation.source,
                            matched = %violation.matched,
                            "aggregator ban violation (audit)"
                        );
                        // lock poisoning would mean a panicking writer; the
                        // log is best-effort in that case
                        if let Ok(mut log) = self.violations.lock() {
                            log.push(violation.clone());
                        }
                    }
                }
                Err(violation)
            }
        }
    }

    /// Scan an endpoint path for aggregated/composite/weighted segments
    pub fn check_endpoint(&self, path: &str) -> Result<(), GuardViolation> {
        let lowered = path.to_lowercase();
        let hit = lowered
            .split(['/', '?', '&', '.'])
            .any(|segment| BANNED_PATH_SEGMENTS.iter().any(|t| segment.contains(t)));
        if hit {
            // every path-segment token is also a banlist token, so this
            // records and reports through the same channel
            self.check_source(path)
        } else {
            Ok(())
        }
    }

    /// Snapshot of the violation log (audit mode)
    pub fn violations(&self) -> Vec<GuardViolation> {
        self.violations
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

/// Assertion for adapter constructors: the identifier must be
/// exchange-native. Matches fail unrecoverably for the construction.
pub fn must_be_exchange_native(identifier: &str) -> Result<(), GuardViolation> {
    let lowered = identifier.to_lowercase();
    if let Some(token) = BANNED_SOURCES.iter().find(|t| lowered.contains(*t)) {
        let violation = GuardViolation {
            source: identifier.to_string(),
            matched: token.to_string(),
            observed_at: Utc::now(),
        };
        error!(source = %identifier, matched = %token, "refusing non-exchange-native source");
        return Err(violation);
    }
    Ok(())
}
