//! Posterior reward feedback.
//!
//! After each cycle the allocator scores every cell: a recent ALARM is
//! a full reward, anything else decays toward the cell's background
//! propensity so quiet-but-busy cells keep a standing claim on effort
//! and dead-quiet cells drift toward the floor.

use chrono::{DateTime, Utc};
use flyway_core::surveillance::CellSurveillanceState;

/// Reward in [0, 1] for one cell at the end of a cycle.
///
/// `last_alarm` is the most recent ALARM signal for this cell, if any.
pub fn detection_reward(
    state: &CellSurveillanceState,
    last_alarm: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    recency_window_days: i64,
    baseline_decay: f64,
) -> f64 {
    if let Some(alarm_at) = last_alarm {
        if (now - alarm_at).num_days() <= recency_window_days {
            return 1.0;
        }
    }
    let background = state.baseline_rate / (1.0 + state.baseline_rate);
    (baseline_decay * background).clamp(0.0, 1.0)
}

/// Fold one reward into a cell's Beta posterior.
pub fn update_posterior(state: &mut CellSurveillanceState, reward: f64) {
    let reward = reward.clamp(0.0, 1.0);
    state.reward_alpha += reward;
    state.reward_beta += 1.0 - reward;
}
