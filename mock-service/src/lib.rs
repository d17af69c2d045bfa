use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Target service for Barrage's integration tests: configurable delay and
/// status endpoints, plus an in-flight high-water mark so tests can observe
/// the concurrency the generator actually produced.
///
/// Counters are per-router, so every `router()` (and thus every listener)
/// is isolated.
pub async fn run(addr: SocketAddr) {
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    serve(listener).await;
}

pub async fn serve(listener: tokio::net::TcpListener) {
    axum::serve(listener, router()).await.unwrap();
}

pub fn router() -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route("/stats", get(stats))
        .with_state(ServiceState::default())
}

#[derive(Clone, Default)]
struct ServiceState {
    hits: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
    max_in_flight: Arc<AtomicU64>,
}

struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl ServiceState {
    fn enter(&self) -> InFlightGuard {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            in_flight: self.in_flight.clone(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn ok(State(state): State<ServiceState>) {
    let _guard = state.enter();
}

async fn delay(State(state): State<ServiceState>, Path(delay_ms): Path<u64>) {
    let _guard = state.enter();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

async fn status(State(state): State<ServiceState>, Path(code): Path<u16>) -> StatusCode {
    let _guard = state.enter();
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Serialize)]
struct Stats {
    hits: u64,
    max_in_flight: u64,
}

async fn stats(State(state): State<ServiceState>) -> Json<Stats> {
    Json(Stats {
        hits: state.hits.load(Ordering::SeqCst),
        max_in_flight: state.max_in_flight.load(Ordering::SeqCst),
    })
}
