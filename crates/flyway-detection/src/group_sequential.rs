//! Group-sequential boundaries via alpha spending.
//!
//! The monitoring window has at most `max_looks` looks. A spending
//! function maps information fraction tau = k / max_looks to the
//! cumulative Type-I budget allowed through look k; the per-look
//! boundary is the normal quantile of that look's incremental spend.
//! Charging each look its full increment ignores the correlation
//! between looks, so the realized family-wise error sits below the
//! nominal alpha.

use crate::stats;
use flyway_core::{Error, Result};

/// Supported alpha-spending shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendingFunction {
    /// Lan-DeMets O'Brien-Fleming analogue: nearly no spend early,
    /// boundaries relax toward the end of the window.
    OBrienFleming,
    /// Pocock analogue: spend spread almost evenly across looks.
    Pocock,
}

/// Cumulative alpha allowed through information fraction `tau`.
pub fn cumulative_spend(function: SpendingFunction, alpha: f64, tau: f64) -> f64 {
    let tau = tau.clamp(0.0, 1.0);
    if tau == 0.0 {
        return 0.0;
    }
    match function {
        SpendingFunction::OBrienFleming => {
            let z_half = stats::inv_norm_cdf(1.0 - alpha / 2.0);
            2.0 * (1.0 - stats::norm_cdf(z_half / tau.sqrt()))
        }
        SpendingFunction::Pocock => alpha * (1.0 + (std::f64::consts::E - 1.0) * tau).ln(),
    }
}

/// Z-scale rejection boundary for one look given its incremental
/// spend. The increment is floored so that early O'Brien-Fleming looks
/// get a finite (if astronomical) boundary.
pub fn look_boundary(delta_alpha: f64) -> f64 {
    stats::inv_norm_cdf(1.0 - delta_alpha.max(1e-12))
}

/// Standardized Poisson z-statistic after `looks` periods with
/// `cumulative_count` total cases against `baseline_rate` per period.
pub fn z_statistic(cumulative_count: u64, looks: u32, baseline_rate: f64) -> Result<f64> {
    let expected = looks as f64 * baseline_rate;
    if expected <= 0.0 {
        return Err(Error::ThresholdConfiguration(format!(
            "z-statistic undefined for expected count {expected}"
        )));
    }
    Ok((cumulative_count as f64 - expected) / expected.sqrt())
}
