//! Detection signal events.
//!
//! A `DetectionSignal` is emitted exactly once per boundary crossing
//! (or timeout) and never mutated afterwards. The advisor and external
//! notification collaborators consume these; the `alpha_spent` and
//! `looks_used` fields carry enough provenance that a consumer can
//! tell a fully-guaranteed alarm from a degraded-mode one.

use crate::geo::CellId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Boundary family that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    Sprt,
    OBrienFleming,
    Pocock,
    Cusum,
}

impl BoundaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryType::Sprt => "sprt",
            BoundaryType::OBrienFleming => "obrien_fleming",
            BoundaryType::Pocock => "pocock",
            BoundaryType::Cusum => "cusum",
        }
    }
}

/// Outcome carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// Upper boundary crossed: outbreak evidence at the configured
    /// error rate.
    Alarm,
    /// Lower boundary crossed or monitoring window timed out without
    /// evidence.
    Cleared,
    /// Still inside the boundaries. Emitted only when a consumer asks
    /// for interim state; not appended to the signal log.
    Continue,
}

/// Immutable event recording a sequential-test decision for one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSignal {
    pub signal_id: Uuid,
    pub cell_id: CellId,
    pub emitted_at: DateTime<Utc>,
    /// The raw sequential statistic at the crossing (log-likelihood
    /// ratio, z-statistic, or CUSUM sum depending on `boundary_type`).
    pub test_statistic: f64,
    pub boundary_type: BoundaryType,
    /// `1 - alpha_spent` at the crossing.
    pub confidence: f64,
    pub status: SignalStatus,
    /// Number of looks consumed in the monitoring window so far.
    pub looks_used: u32,
    /// Cumulative Type-I error budget spent across those looks.
    pub alpha_spent: f64,
}

impl DetectionSignal {
    pub fn new(
        cell_id: CellId,
        status: SignalStatus,
        boundary_type: BoundaryType,
        test_statistic: f64,
        alpha_spent: f64,
        looks_used: u32,
    ) -> Self {
        Self {
            signal_id: Uuid::new_v4(),
            cell_id,
            emitted_at: Utc::now(),
            test_statistic,
            boundary_type,
            confidence: (1.0 - alpha_spent).clamp(0.0, 1.0),
            status,
            looks_used,
            alpha_spent,
        }
    }

    pub fn is_alarm(&self) -> bool {
        self.status == SignalStatus::Alarm
    }
}
