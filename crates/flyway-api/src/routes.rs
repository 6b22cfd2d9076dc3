//! API route definitions.

use crate::handlers::{
    allocation_by_cycle, cancel_job, get_network, health, infer_network, job_status,
    latest_allocation, liveness, metrics_handler, network_recommendations, query_signals,
    readiness, run_cycle,
};
use crate::middleware::cors_layer;
use crate::{ApiConfig, ApiState};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Build the service router.
///
/// `metrics_handle` is optional so embedded and test deployments can
/// skip the Prometheus recorder.
pub fn create_router(
    config: &ApiConfig,
    state: ApiState,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    let api_v1 = Router::new()
        .route("/cycles", post(run_cycle))
        .route("/allocation/latest", get(latest_allocation))
        .route("/allocation/:cycle", get(allocation_by_cycle))
        .route("/signals", get(query_signals))
        .route("/networks/infer", post(infer_network))
        .route("/networks/jobs/:job_id", get(job_status).delete(cancel_job))
        .route("/networks/:network_id", get(get_network))
        .route(
            "/networks/:network_id/recommendations",
            get(network_recommendations),
        )
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .with_state(state);

    let mut app = Router::new().nest("/api/v1", api_v1).merge(health_routes);

    if let Some(handle) = metrics_handle {
        app = app.merge(
            Router::new()
                .route(&config.metrics_path, get(metrics_handler))
                .with_state(handle),
        );
    }

    app.layer(cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeout_secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobRegistry, JobStatus};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use flyway_core::geo::GridPartition;
    use flyway_core::signal::BoundaryType;
    use flyway_detection::{DetectionEngine, DetectorConfig};
    use flyway_ingestion::CaseNormalizer;
    use flyway_network::{InferenceConfig, NetworkInference};
    use flyway_sampling::{AllocatorConfig, ThompsonAllocator};
    use flyway_storage::{MemoryStorage, Storage};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(sync_case_limit: usize) -> ApiState {
        ApiState {
            storage: Arc::new(MemoryStorage::new()),
            detector: Arc::new(DetectionEngine::new(DetectorConfig {
                boundary: BoundaryType::Sprt,
                min_baseline_periods: 3,
                ..DetectorConfig::default()
            })),
            allocator: Arc::new(ThompsonAllocator::new(AllocatorConfig {
                seed: Some(7),
                ..AllocatorConfig::default()
            })),
            inference: Arc::new(NetworkInference::new(InferenceConfig::default())),
            normalizer: Arc::new(CaseNormalizer::new(GridPartition::default())),
            jobs: Arc::new(JobRegistry::new()),
            sync_case_limit,
        }
    }

    fn app(state: ApiState) -> Router {
        create_router(&ApiConfig::default(), state, None)
    }

    fn case_json(lat: f64, day: u32) -> serde_json::Value {
        serde_json::json!({
            "case_id": null,
            "latitude": lat,
            "longitude": -93.0,
            "report_time": format!("2025-03-{day:02}T00:00:00Z"),
            "confirm_time": format!("2025-03-{day:02}T12:00:00Z"),
            "status": "confirmed",
            "species_category": "domestic_poultry",
            "sequence": null,
            "subtype": null,
            "supersedes": null
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoints_respond() {
        let app = app(test_state(10));
        for path in ["/health", "/health/live", "/health/ready"] {
            let response = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn missing_allocation_is_404() {
        let app = app(test_state(10));
        let response = app
            .oneshot(
                Request::get("/api/v1/allocation/latest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn signal_query_returns_empty_log() {
        let app = app(test_state(10));
        let response = app
            .oneshot(
                Request::get("/api/v1/signals")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn small_batch_infers_synchronously() {
        let state = test_state(10);
        let app = app(state.clone());

        let body = serde_json::json!({
            "cases": [case_json(42.00, 1), case_json(42.01, 3), case_json(42.02, 5)]
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/networks/infer")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let network_id = json["data"]["network_id"].as_str().unwrap().to_string();
        assert_eq!(json["data"]["kind"], "inferred");

        // the network and its recommendation are retrievable
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/networks/{network_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/networks/{network_id}/recommendations"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["network_id"].as_str().unwrap(), network_id);
    }

    #[tokio::test]
    async fn threshold_overrides_shape_the_inferred_network() {
        let app = app(test_state(10));

        // two days apart: linked under the default window
        let cases = serde_json::json!([case_json(42.0, 1), case_json(42.0, 3)]);
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/networks/infer")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "cases": cases.clone() }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["metrics"]["edge_count"], 1);

        // a one-day window override severs the link for this run only
        let body = serde_json::json!({ "cases": cases, "temporal_window_days": 1.0 });
        let response = app
            .oneshot(
                Request::post("/api/v1/networks/infer")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["metrics"]["edge_count"], 0);
    }

    #[tokio::test]
    async fn invalid_threshold_override_is_rejected() {
        let app = app(test_state(10));
        let body = serde_json::json!({
            "cases": [case_json(42.0, 1)],
            "spatial_threshold_km": -5.0
        });
        let response = app
            .oneshot(
                Request::post("/api/v1/networks/infer")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cycle_persists_signals_states_and_plan() {
        let state = test_state(10);
        let app = app(state.clone());

        // four baseline days at one case each, then a 30-case burst
        let mut cases: Vec<serde_json::Value> =
            (1..=4).map(|day| case_json(42.0, day)).collect();
        for _ in 0..30 {
            cases.push(case_json(42.0, 5));
        }
        let body = serde_json::json!({ "cases": cases, "budget": 10 });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/cycles")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(
            !json["data"]["signals"].as_array().unwrap().is_empty(),
            "a 30x burst must alarm"
        );
        assert_eq!(json["data"]["plan"]["total_budget"], 10);
        assert!(json["data"]["skipped_cells"].as_array().unwrap().is_empty());

        // the cycle's outputs are now served by the read endpoints
        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/signals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(!json["data"].as_array().unwrap().is_empty());

        let response = app
            .oneshot(
                Request::get("/api/v1/allocation/latest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["cycle"], 0);

        // and directly through the storage trait
        let stored = state
            .storage
            .signals_since(chrono::DateTime::<chrono::Utc>::MIN_UTC)
            .await
            .unwrap();
        assert!(!stored.is_empty());
        assert!(!state.storage.load_cell_states().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn monitored_cells_survive_single_day_batches() {
        let state = test_state(10);
        let app = app(state.clone());

        // seed monitoring with a multi-day batch
        let cases: Vec<serde_json::Value> = (1..=5).map(|day| case_json(42.0, day)).collect();
        let body = serde_json::json!({ "cases": cases });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/cycles")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // a later single-day batch carries no in-batch history, but the
        // cell keeps its stored window and the cycle counter advances
        let body = serde_json::json!({ "cases": [case_json(42.0, 6)] });
        let response = app
            .oneshot(
                Request::post("/api/v1/cycles")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["data"]["skipped_cells"].as_array().unwrap().is_empty());
        assert_eq!(json["data"]["plan"]["cycle"], 1);
    }

    #[tokio::test]
    async fn invalid_case_report_is_rejected() {
        let app = app(test_state(10));
        let mut bad = case_json(42.0, 1);
        bad["latitude"] = serde_json::json!(95.0);
        let body = serde_json::json!({ "cases": [bad] });
        let response = app
            .oneshot(
                Request::post("/api/v1/networks/infer")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn large_batch_becomes_a_job() {
        let state = test_state(1);
        let app = app(state.clone());

        let body = serde_json::json!({
            "cases": [case_json(42.00, 1), case_json(42.01, 3), case_json(42.02, 5)]
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/networks/infer")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        let job_id: uuid::Uuid =
            serde_json::from_value(json["data"]["job_id"].clone()).unwrap();

        // poll until the background task finishes
        let mut network_id = None;
        for _ in 0..100 {
            match state.jobs.status(job_id) {
                Some(JobStatus::Completed { network_id: id }) => {
                    network_id = Some(id);
                    break;
                }
                Some(JobStatus::Running) => {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await
                }
                other => panic!("unexpected job status {other:?}"),
            }
        }
        let network_id = network_id.expect("job never completed");
        assert!(state
            .storage
            .get_network(network_id)
            .await
            .unwrap()
            .is_some());

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/networks/jobs/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["state"], "completed");
    }

    #[tokio::test]
    async fn unknown_network_is_404() {
        let app = app(test_state(10));
        let response = app
            .oneshot(
                Request::get(format!("/api/v1/networks/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancelling_an_unknown_job_is_404() {
        let app = app(test_state(10));
        let response = app
            .oneshot(
                Request::delete(format!("/api/v1/networks/jobs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
