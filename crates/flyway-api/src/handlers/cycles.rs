//! Detection cycle handlers.

use crate::{error_status, ApiState, ErrorResponse, SuccessResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use flyway_core::case::Case;
use flyway_core::geo::CellId;
use flyway_core::signal::DetectionSignal;
use flyway_core::surveillance::CellSurveillanceState;
use flyway_core::Result;
use flyway_detection::periods_from_batch;
use flyway_ingestion::RawCaseReport;
use flyway_sampling::AllocationPlan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument};

fn default_budget() -> u32 {
    100
}

/// Request body for `POST /api/v1/cycles`.
#[derive(Debug, Deserialize)]
pub struct CycleRequest {
    pub cases: Vec<RawCaseReport>,
    #[serde(default = "default_budget")]
    pub budget: u32,
    /// Cycle number; continues from the latest stored plan when omitted.
    #[serde(default)]
    pub cycle: Option<u64>,
}

/// One cycle's outcome as returned to the caller. The same signals and
/// plan are persisted and served by the read endpoints.
#[derive(Debug, Serialize)]
pub struct CycleOutcome {
    pub signals: Vec<DetectionSignal>,
    pub plan: AllocationPlan,
    /// Cells neither monitored nor fittable from this batch.
    pub skipped_cells: Vec<CellId>,
}

/// POST /api/v1/cycles
///
/// Runs one detection and allocation pass over the posted batch.
/// Already-monitored cells keep their stored windows and only take the
/// tested day's count as a new look; unseen cells fit a baseline from
/// the batch's earlier days. States, signals, and the plan are written
/// through storage before the response.
#[instrument(skip(state, request), fields(cases = request.cases.len()))]
pub async fn run_cycle(
    State(state): State<ApiState>,
    Json(request): Json<CycleRequest>,
) -> Response {
    let mut cases = Vec::with_capacity(request.cases.len());
    for raw in request.cases {
        match state.normalizer.normalize(raw) {
            Ok(case) => cases.push(case),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(format!("invalid case report: {e}"))),
                )
                    .into_response()
            }
        }
    }

    match execute_cycle(&state, &cases, request.budget, request.cycle).await {
        Ok(outcome) => (StatusCode::OK, Json(SuccessResponse::new(outcome))).into_response(),
        Err(e) => (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}

async fn execute_cycle(
    state: &ApiState,
    cases: &[Case],
    budget: u32,
    cycle: Option<u64>,
) -> Result<CycleOutcome> {
    let min_periods = state.detector.config().min_baseline_periods;
    let batch = periods_from_batch(cases, min_periods)?;

    let mut states: HashMap<CellId, CellSurveillanceState> = state
        .storage
        .load_cell_states()
        .await?
        .into_iter()
        .map(|s| (s.cell_id.clone(), s))
        .collect();
    // stored windows win; batch-fit baselines only seed unseen cells
    for (cell_id, fitted) in batch.fitted {
        states.entry(cell_id).or_insert(fitted);
    }
    let skipped_cells: Vec<CellId> = batch
        .skipped
        .into_iter()
        .filter(|cell_id| !states.contains_key(cell_id))
        .collect();

    let signals = state.detector.run_cycle(&mut states, &batch.counts)?;

    let last_alarms: HashMap<CellId, DateTime<Utc>> = signals
        .iter()
        .filter(|s| s.is_alarm())
        .map(|s| (s.cell_id.clone(), s.emitted_at))
        .collect();
    state
        .allocator
        .update_posteriors(&mut states, &last_alarms, Utc::now());

    let cycle = match cycle {
        Some(n) => n,
        None => state
            .storage
            .latest_allocation()
            .await?
            .map(|plan| plan.cycle + 1)
            .unwrap_or(0),
    };
    let plan = state.allocator.allocate(&states, budget, cycle)?;

    for cell_state in states.values() {
        state.storage.upsert_cell_state(cell_state).await?;
    }
    for signal in &signals {
        state.storage.append_signal(signal).await?;
    }
    state.storage.put_allocation(&plan).await?;

    info!(
        cycle,
        period = %batch.period,
        cells = plan.cells.len(),
        signals = signals.len(),
        skipped = skipped_cells.len(),
        "detection cycle persisted"
    );

    Ok(CycleOutcome {
        signals,
        plan,
        skipped_cells,
    })
}
