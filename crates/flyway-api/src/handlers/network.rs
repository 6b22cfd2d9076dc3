//! Network inference handlers.

use crate::jobs::JobStatus;
use crate::{error_status, ApiState, ErrorResponse, SuccessResponse};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use flyway_advisor::advise_with_signals;
use flyway_core::case::Case;
use flyway_core::network::TransmissionNetwork;
use flyway_core::{Error, Result};
use flyway_ingestion::RawCaseReport;
use flyway_network::{CancelFlag, NetworkInference};
use flyway_storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// How far back alarm provenance is gathered for a recommendation.
const RECENT_SIGNAL_DAYS: i64 = 30;

/// Request body for `POST /api/v1/networks/infer`.
///
/// Threshold fields override the server configuration for this run
/// only; whichever are omitted keep their configured values.
#[derive(Debug, Deserialize)]
pub struct InferRequest {
    pub cases: Vec<RawCaseReport>,
    #[serde(default)]
    pub temporal_window_days: Option<f64>,
    #[serde(default)]
    pub spatial_threshold_km: Option<f64>,
    #[serde(default)]
    pub genetic_threshold: Option<f64>,
}

impl InferRequest {
    fn has_overrides(&self) -> bool {
        self.temporal_window_days.is_some()
            || self.spatial_threshold_km.is_some()
            || self.genetic_threshold.is_some()
    }
}

/// Handle returned for batches that run in the background.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: Uuid,
}

/// POST /api/v1/networks/infer
///
/// Small batches are inferred on the request; anything larger than the
/// configured limit is accepted with 202 and a job handle.
#[instrument(skip(state, request), fields(cases = request.cases.len()))]
pub async fn infer_network(
    State(state): State<ApiState>,
    Json(request): Json<InferRequest>,
) -> Response {
    let engine = if request.has_overrides() {
        match state.inference.config().with_thresholds(
            request.temporal_window_days,
            request.spatial_threshold_km,
            request.genetic_threshold,
        ) {
            Ok(config) => Arc::new(NetworkInference::new(config)),
            Err(e) => {
                return (error_status(&e), Json(ErrorResponse::new(e.to_string())))
                    .into_response()
            }
        }
    } else {
        Arc::clone(&state.inference)
    };

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

    if cases.len() <= state.sync_case_limit {
        match run_inference(&engine, &*state.storage, cases, CancelFlag::default()).await {
            Ok(network) => {
                (StatusCode::OK, Json(SuccessResponse::new(network))).into_response()
            }
            Err(e) => {
                (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response()
            }
        }
    } else {
        let (job_id, cancel) = state.jobs.start();
        info!(%job_id, cases = cases.len(), "inference deferred to background job");
        let task_state = state.clone();
        tokio::spawn(async move {
            let result = run_inference(&engine, &*task_state.storage, cases, cancel).await;
            match result {
                Ok(network) => task_state.jobs.complete(job_id, network.network_id),
                Err(Error::StaleInput { .. }) => task_state.jobs.mark_cancelled(job_id),
                Err(e) => {
                    error!(%job_id, error = %e, "background inference failed");
                    task_state.jobs.fail(job_id, e.to_string());
                }
            }
        });
        (
            StatusCode::ACCEPTED,
            Json(SuccessResponse::new(JobHandle { job_id })),
        )
            .into_response()
    }
}

/// Run one inference pass off the async executor, then persist the
/// network and its recommendation.
async fn run_inference(
    inference: &Arc<NetworkInference>,
    storage: &dyn Storage,
    cases: Vec<Case>,
    cancel: CancelFlag,
) -> Result<TransmissionNetwork> {
    let engine = Arc::clone(inference);
    // the pipeline is CPU-bound; keep it off the request executor
    let network = tokio::task::spawn_blocking(move || engine.infer_cancellable(&cases, &cancel))
        .await
        .map_err(|e| Error::Storage(format!("inference task aborted: {e}")))??;
    storage.put_network(&network).await?;
    let recent = storage
        .signals_since(Utc::now() - Duration::days(RECENT_SIGNAL_DAYS))
        .await?;
    let recommendation = advise_with_signals(&network, &recent);
    storage.put_recommendation(&recommendation).await?;
    Ok(network)
}

/// GET /api/v1/networks/:network_id
#[instrument(skip(state))]
pub async fn get_network(
    State(state): State<ApiState>,
    Path(network_id): Path<Uuid>,
) -> Response {
    match state.storage.get_network(network_id).await {
        Ok(Some(network)) => {
            (StatusCode::OK, Json(SuccessResponse::new(network))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("unknown network {network_id}"))),
        )
            .into_response(),
        Err(e) => (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}

/// GET /api/v1/networks/:network_id/recommendations
#[instrument(skip(state))]
pub async fn network_recommendations(
    State(state): State<ApiState>,
    Path(network_id): Path<Uuid>,
) -> Response {
    match state.storage.recommendation_for(network_id).await {
        Ok(Some(rec)) => (StatusCode::OK, Json(SuccessResponse::new(rec))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!(
                "no recommendation for network {network_id}"
            ))),
        )
            .into_response(),
        Err(e) => (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}

/// GET /api/v1/networks/jobs/:job_id
#[instrument(skip(state))]
pub async fn job_status(State(state): State<ApiState>, Path(job_id): Path<Uuid>) -> Response {
    match state.jobs.status(job_id) {
        Some(status) => (StatusCode::OK, Json(SuccessResponse::new(status))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("unknown job {job_id}"))),
        )
            .into_response(),
    }
}

/// DELETE /api/v1/networks/jobs/:job_id
#[instrument(skip(state))]
pub async fn cancel_job(State(state): State<ApiState>, Path(job_id): Path<Uuid>) -> Response {
    if state.jobs.cancel(job_id) {
        (
            StatusCode::ACCEPTED,
            Json(SuccessResponse::new(JobStatus::Running)),
        )
            .into_response()
    } else {
        match state.jobs.status(job_id) {
            Some(status) => (
                StatusCode::CONFLICT,
                Json(ErrorResponse::new(format!(
                    "job already finished: {status:?}"
                ))),
            )
                .into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(format!("unknown job {job_id}"))),
            )
                .into_response(),
        }
    }
}
