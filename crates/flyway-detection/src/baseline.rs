//! Baseline rate estimation.
//!
//! The null hypothesis for every cell is Poisson with the cell's own
//! historical mean. A cell with too little history must not be tested
//! at all; that is an error, not a default.

use crate::stats;
use chrono::NaiveDate;
use flyway_core::prelude::*;
use flyway_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// Floor applied to fitted rates so the standardized statistics stay
/// defined for cells whose history is all zeros.
pub const MIN_BASELINE_RATE: f64 = 1e-3;

/// Accumulates per-period historical counts for one cell and fits the
/// Poisson null rate.
#[derive(Debug, Clone, Default)]
pub struct BaselineEstimator {
    periods: Vec<u64>,
}

impl BaselineEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one historical period's case count.
    pub fn record(&mut self, count: u64) {
        self.periods.push(count);
    }

    /// Number of periods recorded so far.
    pub fn periods(&self) -> u32 {
        self.periods.len() as u32
    }

    /// Fit a fresh surveillance state for `cell_id`, or refuse when
    /// history is shorter than `min_periods`.
    pub fn fit(&self, cell_id: CellId, min_periods: u32) -> Result<CellSurveillanceState> {
        let periods = self.periods();
        if periods < min_periods {
            return Err(Error::InsufficientBaseline {
                cell_id,
                periods,
                required: min_periods,
            });
        }
        let counts: Vec<f64> = self.periods.iter().map(|&c| c as f64).collect();
        let rate = stats::mean(&counts).max(MIN_BASELINE_RATE);
        Ok(CellSurveillanceState::new(cell_id, rate, periods))
    }
}

/// Daily per-cell periods derived from one case batch.
#[derive(Debug)]
pub struct BatchPeriods {
    /// Freshly fitted states for cells with enough in-batch history.
    pub fitted: HashMap<CellId, CellSurveillanceState>,
    /// Case counts on the tested day, per cell.
    pub counts: HashMap<CellId, u64>,
    /// Cells whose in-batch history was shorter than the minimum.
    pub skipped: Vec<CellId>,
    /// First calendar day in the batch.
    pub span_start: NaiveDate,
    /// The day under test, the batch's last.
    pub period: NaiveDate,
}

/// Split a case batch into baseline history and the period under test.
///
/// The batch's final calendar day is the tested period; every earlier
/// day in the span feeds each cell's baseline, with absent days
/// counting as zero. Cells are fitted against the whole span, so a
/// batch shorter than `min_periods + 1` days skips every cell.
pub fn periods_from_batch(cases: &[Case], min_periods: u32) -> Result<BatchPeriods> {
    let days: Vec<NaiveDate> = cases.iter().map(|c| c.report_time.date_naive()).collect();
    let (span_start, period) = match (days.iter().min(), days.iter().max()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(Error::InvalidCase("empty case batch".to_string())),
    };

    let mut daily: HashMap<CellId, BTreeMap<NaiveDate, u64>> = HashMap::new();
    for (case, day) in cases.iter().zip(&days) {
        *daily
            .entry(case.cell_id.clone())
            .or_default()
            .entry(*day)
            .or_insert(0) += 1;
    }

    let mut fitted = HashMap::new();
    let mut counts = HashMap::new();
    let mut skipped = Vec::new();
    for (cell_id, by_day) in daily {
        let mut estimator = BaselineEstimator::new();
        let mut day = span_start;
        while day < period {
            estimator.record(by_day.get(&day).copied().unwrap_or(0));
            day = day
                .succ_opt()
                .ok_or_else(|| Error::InvalidCase("date overflow in case batch".to_string()))?;
        }
        counts.insert(cell_id.clone(), by_day.get(&period).copied().unwrap_or(0));
        match estimator.fit(cell_id.clone(), min_periods) {
            Ok(state) => {
                fitted.insert(cell_id, state);
            }
            Err(Error::InsufficientBaseline { .. }) => skipped.push(cell_id),
            Err(other) => return Err(other),
        }
    }
    skipped.sort();

    Ok(BatchPeriods {
        fitted,
        counts,
        skipped,
        span_start,
        period,
    })
}
