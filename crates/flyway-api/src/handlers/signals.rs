//! Signal log handlers.

use crate::{error_status, ApiState, ErrorResponse, SuccessResponse};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    /// RFC 3339 lower bound; omitted means the whole log.
    pub since: Option<DateTime<Utc>>,
}

/// GET /api/v1/signals?since=<rfc3339>
#[instrument(skip(state))]
pub async fn query_signals(
    State(state): State<ApiState>,
    Query(query): Query<SignalsQuery>,
) -> Response {
    let since = query.since.unwrap_or(DateTime::<Utc>::MIN_UTC);
    match state.storage.signals_since(since).await {
        Ok(signals) => (StatusCode::OK, Json(SuccessResponse::new(signals))).into_response(),
        Err(e) => (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}
