use thiserror::Error;

use crate::metrics::CalcError;
use crate::proof::ProofError;
use crate::venue::guard::GuardViolation;

/// Top-level error type for the execution-feasibility engine
///
/// Subsystem errors (`VenueError`, `CalcError`, `ProofError`) are recovered
/// locally wherever a fallback exists: a failing venue is dropped, a failing
/// calculator fails its gate. Only unrecoverable conditions reach the caller;
/// `InsufficientHealthyVenues` in particular is rendered into the result's
/// critical failures and failure reasons instead of being returned, since
/// that evaluation still emits its (non-passing) proof bundle.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("aggregator ban violation: {0}")]
    AggregatorBan(#[from] GuardViolation),

    #[error("venue unavailable: {venue}: {reason}")]
    VenueUnavailable { venue: String, reason: String },

    #[error("insufficient healthy venues: {healthy} < {required}")]
    InsufficientHealthyVenues { healthy: usize, required: usize },

    #[error("calculation failure: {0}")]
    Calculation(#[from] CalcError),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("proof sink error: {0}")]
    Proof(#[from] ProofError),
}

impl EngineError {
    /// Stable machine-readable kind, preserved verbatim in failure reasons
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::AggregatorBan(_) => "aggregator_ban_violation",
            EngineError::VenueUnavailable { .. } => "venue_unavailable",
            EngineError::InsufficientHealthyVenues { .. } => "insufficient_healthy_venues",
            EngineError::Calculation(_) => "calculation_failure",
            EngineError::Cancelled => "cancelled",
            EngineError::Proof(_) => "proof_sink_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        let err = EngineError::InsufficientHealthyVenues {
            healthy: 0,
            required: 1,
        };
        assert_eq!(err.kind(), "insufficient_healthy_venues");
        assert_eq!(err.to_string(), "insufficient healthy venues: 0 < 1");

        assert_eq!(EngineError::Cancelled.kind(), "cancelled");
        assert_eq!(
            EngineError::InvalidInput("negative ADV".into()).kind(),
            "invalid_input"
        );
    }
}
