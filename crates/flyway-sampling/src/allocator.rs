//! Thompson-sampling budget apportionment.

use chrono::{DateTime, Utc};
use flyway_core::config::SamplingSection;
use flyway_core::geo::CellId;
use flyway_core::surveillance::CellSurveillanceState;
use flyway_core::{Error, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

/// Runtime allocator settings.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    pub floor_per_cell: u32,
    pub recency_window_days: i64,
    pub baseline_decay: f64,
    pub prior_alpha: f64,
    pub prior_beta: f64,
    /// Fixed seed makes a (cycle, states) pair reproduce its plan
    /// exactly; `None` draws fresh entropy every cycle.
    pub seed: Option<u64>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            floor_per_cell: 1,
            recency_window_days: 7,
            baseline_decay: 0.9,
            prior_alpha: 1.0,
            prior_beta: 1.0,
            seed: None,
        }
    }
}

impl AllocatorConfig {
    pub fn from_section(section: &SamplingSection) -> Result<Self> {
        if !(0.0..=1.0).contains(&section.baseline_decay) {
            return Err(Error::ThresholdConfiguration(format!(
                "baseline_decay must be in [0, 1], got {}",
                section.baseline_decay
            )));
        }
        if section.prior_alpha <= 0.0 || section.prior_beta <= 0.0 {
            return Err(Error::ThresholdConfiguration(
                "beta prior parameters must be positive".to_string(),
            ));
        }
        Ok(Self {
            floor_per_cell: section.floor_per_cell,
            recency_window_days: section.recency_window_days,
            baseline_decay: section.baseline_decay,
            prior_alpha: section.prior_alpha,
            prior_beta: section.prior_beta,
            seed: section.seed,
        })
    }
}

/// Whether the budget covered the floor for every monitored cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageMode {
    /// Every cell received at least the floor.
    Full,
    /// Budget below `cells * floor`: only the best-ranked cells were
    /// funded this cycle.
    Partial,
}

/// One cell's share of a cycle's budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellAllocation {
    pub cell_id: CellId,
    pub budget: u32,
    /// Posterior mean of the cell's detection propensity.
    pub posterior_mean: f64,
    /// The Thompson draw this ranking used.
    pub sampled_value: f64,
}

/// The immutable allocation result for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub allocation_id: Uuid,
    pub cycle: u64,
    pub generated_at: DateTime<Utc>,
    pub total_budget: u32,
    pub coverage: CoverageMode,
    /// Ordered best-ranked first.
    pub cells: Vec<CellAllocation>,
}

impl AllocationPlan {
    pub fn budget_for(&self, cell_id: &CellId) -> u32 {
        self.cells
            .iter()
            .find(|c| &c.cell_id == cell_id)
            .map(|c| c.budget)
            .unwrap_or(0)
    }

    fn allocated(&self) -> u32 {
        self.cells.iter().map(|c| c.budget).sum()
    }
}

/// Per-cycle Thompson-sampling allocator.
#[derive(Debug, Clone)]
pub struct ThompsonAllocator {
    config: AllocatorConfig,
}

impl ThompsonAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Score last cycle's outcomes into the per-cell posteriors.
    /// `last_alarms` maps cells to their most recent ALARM time.
    pub fn update_posteriors(
        &self,
        states: &mut HashMap<CellId, CellSurveillanceState>,
        last_alarms: &HashMap<CellId, DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        for state in states.values_mut() {
            let reward = crate::reward::detection_reward(
                state,
                last_alarms.get(&state.cell_id).copied(),
                now,
                self.config.recency_window_days,
                self.config.baseline_decay,
            );
            crate::reward::update_posterior(state, reward);
        }
    }

    /// Apportion `total_budget` across the monitored cells.
    ///
    /// Exactly `total_budget` units are handed out (conservation holds
    /// to the unit). With enough capacity every cell gets at least the
    /// floor and the surplus is split by rank with largest-remainder
    /// rounding; otherwise the plan degrades to partial coverage and
    /// only the best-ranked cells are funded.
    pub fn allocate(
        &self,
        states: &HashMap<CellId, CellSurveillanceState>,
        total_budget: u32,
        cycle: u64,
    ) -> Result<AllocationPlan> {
        let mut ranked = self.rank_cells(states, cycle)?;
        let n = ranked.len();

        let floor = self.config.floor_per_cell.max(1);
        let full_floor_cost = floor as u64 * n as u64;
        let coverage = if n > 0 && (total_budget as u64) < full_floor_cost {
            CoverageMode::Partial
        } else {
            CoverageMode::Full
        };

        match coverage {
            CoverageMode::Partial => {
                warn!(
                    cells = n,
                    total_budget,
                    floor,
                    "budget below full-coverage floor; funding top-ranked cells only"
                );
                let mut remaining = total_budget;
                for cell in ranked.iter_mut() {
                    let grant = remaining.min(floor);
                    cell.budget = grant;
                    remaining -= grant;
                }
            }
            CoverageMode::Full => {
                let surplus = total_budget - (floor as u64 * n as u64) as u32;
                let weights: Vec<u64> = (0..n).map(|rank| (n - rank) as u64).collect();
                let shares = largest_remainder(surplus, &weights);
                for (cell, extra) in ranked.iter_mut().zip(shares) {
                    cell.budget = floor + extra;
                }
            }
        }

        let plan = AllocationPlan {
            allocation_id: Uuid::new_v4(),
            cycle,
            generated_at: Utc::now(),
            total_budget,
            coverage,
            cells: ranked,
        };
        debug_assert_eq!(
            plan.allocated(),
            if n == 0 { 0 } else { total_budget },
            "allocation must conserve the budget"
        );

        info!(
            cycle,
            cells = n,
            total_budget,
            coverage = ?plan.coverage,
            "allocation plan generated"
        );
        metrics::gauge!("flyway_allocation_cells").set(n as f64);
        metrics::counter!("flyway_allocation_cycles_total").increment(1);

        Ok(plan)
    }

    /// Draw once from every posterior and order best-first. Ties break
    /// on cell id so a seeded run is fully reproducible.
    fn rank_cells(
        &self,
        states: &HashMap<CellId, CellSurveillanceState>,
        cycle: u64,
    ) -> Result<Vec<CellAllocation>> {
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(cycle)),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut cell_ids: Vec<&CellId> = states.keys().collect();
        cell_ids.sort();

        let mut ranked = Vec::with_capacity(cell_ids.len());
        for cell_id in cell_ids {
            let state = &states[cell_id];
            let alpha = state.reward_alpha.max(f64::EPSILON);
            let beta = state.reward_beta.max(f64::EPSILON);
            let dist = Beta::new(alpha, beta).map_err(|e| {
                Error::ThresholdConfiguration(format!(
                    "degenerate posterior for {cell_id}: {e}"
                ))
            })?;
            ranked.push(CellAllocation {
                cell_id: cell_id.clone(),
                budget: 0,
                posterior_mean: alpha / (alpha + beta),
                sampled_value: dist.sample(&mut rng),
            });
        }

        ranked.sort_by(|a, b| {
            b.sampled_value
                .total_cmp(&a.sampled_value)
                .then_with(|| a.cell_id.cmp(&b.cell_id))
        });
        Ok(ranked)
    }
}

/// Integer apportionment of `total` by `weights` with largest-remainder
/// rounding. Returns one share per weight; shares sum to `total`.
fn largest_remainder(total: u32, weights: &[u64]) -> Vec<u32> {
    let weight_sum: u64 = weights.iter().sum();
    if weight_sum == 0 || weights.is_empty() {
        return vec![0; weights.len()];
    }

    let mut shares: Vec<u32> = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(weights.len());
    let mut assigned: u32 = 0;
    for (i, &w) in weights.iter().enumerate() {
        let exact = total as f64 * w as f64 / weight_sum as f64;
        let base = exact.floor() as u32;
        shares.push(base);
        assigned += base;
        remainders.push((i, exact - f64::from(base)));
    }

    // Hand the leftover units to the largest fractional remainders,
    // best rank first on ties.
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let mut leftover = total - assigned;
    for (i, _) in remainders {
        if leftover == 0 {
            break;
        }
        shares[i] += 1;
        leftover -= 1;
    }
    shares
}
