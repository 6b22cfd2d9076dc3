//! Per-cell surveillance state.
//!
//! One record per geographic cell, owned exclusively by the
//! allocator/detector pair. Detector passes are pure: they take a
//! state and return a new one, which keeps per-cell processing
//! shared-nothing and parallel-safe.

use crate::geo::CellId;
use serde::{Deserialize, Serialize};

/// Phase of a cell's monitoring window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    /// No observations in the current window yet.
    Monitoring,
    /// Inside the boundaries; testing continues.
    Continue,
    /// Upper boundary crossed. Terminal for the window.
    Alarm,
    /// Lower boundary crossed or window timed out. Terminal for the
    /// window.
    Cleared,
}

/// Surveillance state for one geographic cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSurveillanceState {
    pub cell_id: CellId,
    /// Expected background case rate per period (Poisson null mean).
    pub baseline_rate: f64,
    /// Number of historical periods the baseline was fit on. Testing
    /// is suppressed until this reaches the configured minimum.
    pub baseline_periods: u32,
    /// Sampling effort allocated to this cell in the current cycle.
    pub current_budget: u32,
    /// Running sequential-test statistic (meaning depends on the
    /// configured boundary family).
    pub cumulative_statistic: f64,
    /// Cumulative case count within the current monitoring window
    /// (used by the group-sequential z-statistic).
    pub cumulative_count: u64,
    pub boundary_crossed: bool,
    pub phase: MonitorPhase,
    /// Looks taken in the current monitoring window.
    pub looks_so_far: u32,
    /// Type-I error budget spent across those looks.
    pub alpha_spent: f64,
    /// Beta-Bernoulli posterior over "this cell yields detections",
    /// owned by the allocator.
    pub reward_alpha: f64,
    pub reward_beta: f64,
}

impl CellSurveillanceState {
    /// Fresh state for a cell with a fitted baseline.
    pub fn new(cell_id: CellId, baseline_rate: f64, baseline_periods: u32) -> Self {
        Self {
            cell_id,
            baseline_rate,
            baseline_periods,
            current_budget: 0,
            cumulative_statistic: 0.0,
            cumulative_count: 0,
            boundary_crossed: false,
            phase: MonitorPhase::Monitoring,
            looks_so_far: 0,
            alpha_spent: 0.0,
            reward_alpha: 1.0,
            reward_beta: 1.0,
        }
    }

    /// Reopen a fresh monitoring window after a terminal phase,
    /// preserving the baseline and the allocator's posterior.
    pub fn reset_window(&self) -> Self {
        Self {
            cumulative_statistic: 0.0,
            cumulative_count: 0,
            boundary_crossed: false,
            phase: MonitorPhase::Monitoring,
            looks_so_far: 0,
            alpha_spent: 0.0,
            ..self.clone()
        }
    }

    /// Whether the current window has reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, MonitorPhase::Alarm | MonitorPhase::Cleared)
    }
}
