//! Wald sequential probability ratio test for a Poisson rate.
//!
//! Null: per-period counts follow Poisson(lambda0). Alternative:
//! Poisson(r * lambda0) with r the configured elevation ratio. The
//! running log-likelihood ratio accepts the alternative at the upper
//! bound and the null at the lower bound; between them monitoring
//! continues.

use flyway_core::{Error, Result};

/// Wald decision bounds in log-likelihood-ratio space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SprtBounds {
    /// Crossing from below means ALARM.
    pub upper: f64,
    /// Crossing from above means CLEARED.
    pub lower: f64,
}

/// Derive the Wald bounds from the target error rates.
pub fn bounds(alpha: f64, beta: f64) -> Result<SprtBounds> {
    if !(0.0 < alpha && alpha < 1.0) || !(0.0 < beta && beta < 1.0) {
        return Err(Error::ThresholdConfiguration(format!(
            "sprt error rates must be in (0, 1): alpha={alpha}, beta={beta}"
        )));
    }
    Ok(SprtBounds {
        upper: ((1.0 - beta) / alpha).ln(),
        lower: (beta / (1.0 - alpha)).ln(),
    })
}

/// Log-likelihood-ratio increment contributed by one period with
/// `count` observed cases.
pub fn increment(count: u64, baseline_rate: f64, elevation_ratio: f64) -> f64 {
    count as f64 * elevation_ratio.ln() - baseline_rate * (elevation_ratio - 1.0)
}
