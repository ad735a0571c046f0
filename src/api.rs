//! Read-only HTTP access to computed QoS results.
//!
//! Every request reads the configured store, so a new `run` is visible without
//! restarting the server.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::error::{QosError, Result};
use crate::model::QosResult;
use crate::storage::QosStore;
use crate::storage::fields::parse_date;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn QosStore>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid week '{0}', expected dd.mm.yyyy")]
    BadWeek(String),

    #[error(transparent)]
    Store(#[from] QosError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            ApiError::BadWeek(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/qos", get(all_results))
        .route("/qos/location/{location}", get(by_location))
        .route("/qos/week/{week_start}", get(by_week))
        .route(
            "/qos/location/{location}/{week_start}",
            get(by_location_and_week),
        )
        .with_state(state)
}

/// Serves the stored results until the process is stopped.
///
/// The store is read once up front so an unreadable output fails at startup.
pub async fn serve(store: Arc<dyn QosStore>, config: &ApiConfig) -> Result<()> {
    let results = store.read_results().await?;
    if results.is_empty() {
        warn!(source = %store.output_target(), "No QoS results to serve");
    }

    let address = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&address).await?;
    info!(%address, results = results.len(), "QoS API listening");

    axum::serve(listener, router(ApiState { store })).await?;
    Ok(())
}

fn parse_week(raw: &str) -> std::result::Result<NaiveDate, ApiError> {
    parse_date(raw).ok_or_else(|| ApiError::BadWeek(raw.to_string()))
}

type ApiResult = std::result::Result<Json<Vec<QosResult>>, ApiError>;

async fn select(state: &ApiState, keep: impl Fn(&QosResult) -> bool) -> ApiResult {
    let results = state.store.read_results().await.inspect_err(|e| {
        error!(kind = e.kind(), error = %e, "Failed to read QoS results");
    })?;
    Ok(Json(results.into_iter().filter(|r| keep(r)).collect()))
}

async fn all_results(State(state): State<ApiState>) -> ApiResult {
    select(&state, |_| true).await
}

async fn by_location(State(state): State<ApiState>, Path(location): Path<String>) -> ApiResult {
    select(&state, |r| r.location == location).await
}

async fn by_week(State(state): State<ApiState>, Path(week_start): Path<String>) -> ApiResult {
    let week = parse_week(&week_start)?;
    select(&state, |r| r.week_start == week).await
}

async fn by_location_and_week(
    State(state): State<ApiState>,
    Path((location, week_start)): Path<(String, String)>,
) -> ApiResult {
    let week = parse_week(&week_start)?;
    select(&state, |r| r.location == location && r.week_start == week).await
}
