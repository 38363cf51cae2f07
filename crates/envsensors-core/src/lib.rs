//! Shared vocabulary of the environmental sensor telemetry agent.
//!
//! Commands, response codes, the validated device configuration, the
//! telemetry sample and the outbound message envelope live here so the
//! hardware, agent and network crates agree on one set of types.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{CommandError, Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
