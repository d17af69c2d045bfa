//! Network-facing control API for Barrage.
//!
//! A thin axum wrapper around the engine: `POST /loadtest` runs a load test
//! to completion and returns the report; `POST /runs` starts a registered
//! run whose state and in-progress snapshots can be streamed from
//! `GET /runs/:id` and cancelled with `POST /runs/:id/cancel`.
mod error;
pub mod registry;
pub mod server;

pub use error::RuntimeError;
pub use registry::RunRegistry;
pub use server::{router, serve, serve_listener, LoadTestRequest, RunReport, RunStarted};
