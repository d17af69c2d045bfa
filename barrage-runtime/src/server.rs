use crate::error::RuntimeError;
use crate::registry::RunRegistry;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use barrage::http_runner;
use barrage_core::{
    default_concurrency, ConfigError, LoadTestConfig, RunResult, RunState, RunSummary,
    SaturationPolicy, StopCondition, DEFAULT_REQUEST_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Bind the control API on `0.0.0.0:port` and serve until the process
/// exits.
pub async fn serve(port: u16) -> Result<(), RuntimeError> {
    let socket_addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    serve_listener(listener).await
}

/// Serve the control API on an already-bound listener (lets tests bind an
/// ephemeral port).
pub async fn serve_listener(listener: tokio::net::TcpListener) -> Result<(), RuntimeError> {
    debug!("control API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(RunRegistry::new())).await?;
    Ok(())
}

pub fn router(registry: RunRegistry) -> Router {
    Router::new()
        .route("/loadtest", post(run_blocking))
        .route("/runs", post(start_run))
        .route("/runs/:id", get(run_status))
        .route("/runs/:id/cancel", post(cancel_run))
        .with_state(registry)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Wire format for starting a load test. Exactly one of `duration_secs` and
/// `request_count` must be present; unknown fields are rejected before the
/// engine is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadTestRequest {
    pub target: String,
    #[serde(default = "default_rate")]
    pub rate: f64,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub request_count: Option<u64>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub drop_on_saturation: bool,
    #[serde(default)]
    pub drain_deadline_secs: Option<f64>,
    /// Per-request timeout; defaults to 30 seconds when absent.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

fn default_rate() -> f64 {
    1.
}

impl LoadTestRequest {
    pub fn into_config(self) -> Result<LoadTestConfig, ConfigError> {
        let stop = match (self.duration_secs, self.request_count) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingStopCondition),
            (None, None) => return Err(ConfigError::MissingStopCondition),
            (Some(secs), None) => StopCondition::Duration(secs_to_duration(secs)?),
            (None, Some(count)) => StopCondition::Requests(count),
        };

        let config = LoadTestConfig {
            target: self.target,
            rate: self.rate,
            stop,
            max_concurrency: self
                .max_concurrency
                .unwrap_or_else(|| default_concurrency(self.rate)),
            on_saturation: if self.drop_on_saturation {
                SaturationPolicy::Drop
            } else {
                SaturationPolicy::Queue
            },
            drain_deadline: self
                .drain_deadline_secs
                .map(secs_to_duration)
                .transpose()?,
            request_timeout: match self.timeout_secs {
                Some(secs) => Some(secs_to_duration(secs)?),
                None => Some(DEFAULT_REQUEST_TIMEOUT),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn secs_to_duration(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidDuration(secs))
}

/// Response body for both the blocking endpoint and run-status queries. The
/// embedded result is provisional unless `state` is terminal.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub state: RunState,
    #[serde(flatten)]
    pub result: RunResult,
    pub error_rate: f64,
    pub summary: RunSummary,
}

impl RunReport {
    fn new(state: RunState, result: RunResult) -> Self {
        Self {
            state,
            error_rate: result.error_rate(),
            summary: result.summary(),
            result,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunStarted {
    pub id: Uuid,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("invalid load test request: {0}")]
    Config(#[from] ConfigError),

    #[error("no run with id {0}")]
    NotFound(Uuid),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Config(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

/// `POST /loadtest`: run to completion, answer with the final report. This
/// is the original one-shot contract; long runs hold the connection open.
#[instrument(skip_all)]
async fn run_blocking(
    Json(request): Json<LoadTestRequest>,
) -> Result<Json<RunReport>, ApiError> {
    let runner = http_runner(request.into_config()?)?;
    let result = runner.run().await;
    Ok(Json(RunReport::new(RunState::Completed, result)))
}

/// `POST /runs`: start a registered run and answer immediately with its id.
#[instrument(skip_all)]
async fn start_run(
    State(registry): State<RunRegistry>,
    Json(request): Json<LoadTestRequest>,
) -> Result<(StatusCode, Json<RunStarted>), ApiError> {
    let id = registry.start(request.into_config()?)?;
    Ok((StatusCode::ACCEPTED, Json(RunStarted { id })))
}

/// `GET /runs/:id`: current state plus a consistent snapshot.
async fn run_status(
    State(registry): State<RunRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunReport>, ApiError> {
    let status = registry.status(&id).ok_or(ApiError::NotFound(id))?;
    Ok(Json(RunReport::new(status.state, status.snapshot)))
}

/// `POST /runs/:id/cancel`: cooperative cancellation; the run drains and
/// finalizes with whatever was recorded.
async fn cancel_run(
    State(registry): State<RunRegistry>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if registry.cancel(&id) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::NotFound(id))
    }
}
