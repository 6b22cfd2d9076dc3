//! Allocation plan handlers.

use crate::{error_status, ApiState, ErrorResponse, SuccessResponse};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::instrument;

/// GET /api/v1/allocation/latest
#[instrument(skip(state))]
pub async fn latest_allocation(State(state): State<ApiState>) -> Response {
    match state.storage.latest_allocation().await {
        Ok(Some(plan)) => (StatusCode::OK, Json(SuccessResponse::new(plan))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("no allocation plan generated yet")),
        )
            .into_response(),
        Err(e) => (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}

/// GET /api/v1/allocation/:cycle
#[instrument(skip(state))]
pub async fn allocation_by_cycle(
    State(state): State<ApiState>,
    Path(cycle): Path<u64>,
) -> Response {
    match state.storage.get_allocation(cycle).await {
        Ok(Some(plan)) => (StatusCode::OK, Json(SuccessResponse::new(plan))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("no plan for cycle {cycle}"))),
        )
            .into_response(),
        Err(e) => (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}
