//! Standardized one-sided CUSUM chart.
//!
//! Tracks persistent small upward shifts that single-look tests miss.
//! Counts are standardized against the Poisson baseline, the reference
//! value `k` is subtracted, and the running sum is clamped at zero.
//! The chart never dismisses on its own; a quiet cell only resets via
//! the window timeout.

use flyway_core::{Error, Result};

/// One CUSUM update. Returns the new running sum.
pub fn step(running: f64, count: u64, baseline_rate: f64, reference_k: f64) -> Result<f64> {
    if baseline_rate <= 0.0 {
        return Err(Error::ThresholdConfiguration(format!(
            "cusum undefined for baseline rate {baseline_rate}"
        )));
    }
    let z = (count as f64 - baseline_rate) / baseline_rate.sqrt();
    Ok((running + z - reference_k).max(0.0))
}
