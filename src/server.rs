//! HTTP surface for the explorer: snapshot meta, refresh, and school comparison.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::models::{SchoolTimeseries, SnapshotMeta};
use crate::snapshot::{regenerate, SnapshotStore};
use crate::source::RecordSource;
use crate::timeseries::{build_school_timeseries, select_schools};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn RecordSource>,
    pub store: Arc<SnapshotStore>,
}

impl AppState {
    pub fn new(source: Arc<dyn RecordSource>, store: Arc<SnapshotStore>) -> Self {
        Self { source, store }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/explorer/snapshot/meta", get(snapshot_meta))
        .route("/api/explorer/refresh-snapshot", post(refresh_snapshot))
        .route("/api/explorer/schools/compare", get(compare_schools))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/explorer/snapshot/meta
pub async fn snapshot_meta(State(state): State<AppState>) -> Result<Json<SnapshotMeta>, ApiError> {
    match state.store.read_meta().await {
        Ok(Some(meta)) => Ok(Json(meta)),
        Ok(None) => Err(ApiError::NotFound(
            "Snapshot not found. Please generate snapshots first.".to_string(),
        )),
        Err(e) => {
            error!("Error reading snapshot meta: {}", e);
            Err(ApiError::Internal("Failed to read snapshot metadata".to_string()))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(flatten)]
    pub meta: SnapshotMeta,
}

/// POST /api/explorer/refresh-snapshot
pub async fn refresh_snapshot(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    match regenerate(state.source.as_ref(), &state.store).await {
        Ok(meta) => Ok(Json(RefreshResponse {
            success: true,
            meta,
        })),
        Err(e) => {
            error!("Error refreshing snapshots: {}", e);
            Err(ApiError::Internal(format!("Failed to refresh snapshots: {e}")))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub schools: Option<String>,
}

/// Splits a comma-separated school list, dropping blanks and repeats.
pub fn parse_school_list(raw: &str) -> Vec<String> {
    select_schools(raw.split(','))
}

/// GET /api/explorer/schools/compare?schools=a,b
pub async fn compare_schools(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<SchoolTimeseries>, ApiError> {
    let schools = params
        .schools
        .as_deref()
        .map(parse_school_list)
        .unwrap_or_default();
    if schools.is_empty() {
        return Err(ApiError::BadRequest("Schools parameter required".to_string()));
    }

    let records = state.source.fetch_schools(&schools).await.map_err(|e| {
        error!("Error getting school comparison: {}", e);
        ApiError::Internal("Failed to get school comparison data".to_string())
    })?;

    Ok(Json(build_school_timeseries(&records, schools.as_slice())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::COMPARE_MAX_SCHOOLS;

    #[test]
    fn school_list_is_trimmed_deduplicated_and_capped() {
        assert_eq!(
            parse_school_list(" Yale , ,Harvard,Yale"),
            vec!["Yale".to_string(), "Harvard".to_string()]
        );
        assert_eq!(parse_school_list("a,b,c,d,e,f,g").len(), COMPARE_MAX_SCHOOLS);
        assert!(parse_school_list(" , ").is_empty());
    }
}
