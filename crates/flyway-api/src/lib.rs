//! HTTP service surface.
//!
//! Read endpoints serve allocation plans, the signal log, stored
//! networks, and their recommendations. Two write endpoints accept
//! case batches: one runs a detection and allocation cycle and
//! persists its outcomes, the other runs network inference,
//! synchronously for small batches and as a cancellable background
//! job above the configured size limit.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod routes;

use axum::http::StatusCode;
use flyway_core::config::ServerConfig;
use flyway_core::Error;
use flyway_detection::DetectionEngine;
use flyway_ingestion::CaseNormalizer;
use flyway_network::NetworkInference;
use flyway_sampling::ThompsonAllocator;
use flyway_storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API layer settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub cors_origins: Vec<String>,
    pub timeout_secs: u64,
    pub metrics_path: String,
    /// Case count above which inference runs as a background job.
    pub sync_case_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec!["*".to_string()],
            timeout_secs: 30,
            metrics_path: "/metrics".to_string(),
            sync_case_limit: 500,
        }
    }
}

impl ApiConfig {
    pub fn from_server(server: &ServerConfig, sync_case_limit: usize) -> Self {
        Self {
            cors_origins: server.cors_origins.clone(),
            timeout_secs: server.request_timeout_secs,
            metrics_path: "/metrics".to_string(),
            sync_case_limit,
        }
    }
}

/// Shared state behind the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<dyn Storage>,
    pub detector: Arc<DetectionEngine>,
    pub allocator: Arc<ThompsonAllocator>,
    pub inference: Arc<NetworkInference>,
    pub normalizer: Arc<CaseNormalizer>,
    pub jobs: Arc<jobs::JobRegistry>,
    pub sync_case_limit: usize,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("sync_case_limit", &self.sync_case_limit)
            .finish_non_exhaustive()
    }
}

/// Standard success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Standard error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Map a domain error onto an HTTP status.
pub fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::InvalidCase(_) | Error::Config(_) | Error::ThresholdConfiguration(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::InsufficientBaseline { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::StaleInput { .. } => StatusCode::CONFLICT,
        Error::Storage(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
