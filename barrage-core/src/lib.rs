//! Shared types for the Barrage load generator.
//!
//! This crate holds the plain-data vocabulary used by the engine
//! ([`barrage`](https://docs.rs/barrage)), the control API and the CLI:
//! run configuration, per-attempt outcomes, accumulated results and the
//! run lifecycle. There is no async code here.
mod config;
mod outcome;
mod result;
mod state;

pub use config::*;
pub use outcome::*;
pub use result::*;
pub use state::*;
