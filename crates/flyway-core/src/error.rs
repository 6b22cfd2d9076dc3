//! Error taxonomy for the Flyway engine.
//!
//! Statistical and data-sufficiency conditions are recoverable and
//! surfaced as typed errors the caller can retry next cycle.
//! Configuration errors are fatal at call time and never swallowed:
//! a malformed threshold would silently corrupt detection guarantees.
//!
//! Two conditions are deliberately NOT errors:
//! - a partial-coverage allocation is data on the `Allocation` itself
//! - an empty transmission network is `NetworkKind::Empty`, a valid
//!   terminal state for fewer than two confirmed cases

use crate::geo::CellId;
use uuid::Uuid;

/// Result alias used across all Flyway crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by every Flyway crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The detector cannot test a cell yet: not enough baseline
    /// history to fit a null model. Recoverable, retried next cycle.
    #[error("insufficient baseline for cell {cell_id}: {periods} periods observed, {required} required")]
    InsufficientBaseline {
        cell_id: CellId,
        periods: u32,
        required: u32,
    },

    /// A distance threshold or weight is malformed (negative, NaN,
    /// non-normalizable). Fatal: rejected at call time.
    #[error("threshold configuration error: {0}")]
    ThresholdConfiguration(String),

    /// An inference run was cancelled because its inputs went stale
    /// mid-computation. The caller must retry with fresh inputs.
    #[error("inference run {run_id} cancelled: inputs stale")]
    StaleInput { run_id: Uuid },

    /// A case record failed validation during normalization.
    #[error("invalid case: {0}")]
    InvalidCase(String),

    /// Configuration file could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A storage backend operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the condition is expected to clear on retry without
    /// operator intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBaseline { .. } | Error::StaleInput { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        let e = Error::InsufficientBaseline {
            cell_id: CellId::new("c1"),
            periods: 3,
            required: 14,
        };
        assert!(e.is_recoverable());

        let e = Error::ThresholdConfiguration("negative spatial threshold".into());
        assert!(!e.is_recoverable());
    }
}
