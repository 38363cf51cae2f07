//! Command handling and telemetry supervision for the environmental sensor
//! agent.
//!
//! - [`CommandHandler`]: accepts `configure`, `start` and `stop`, keeps the
//!   configuration and replies with a response code per command.
//! - [`EssInstrument`]: runs one sensor reader in a cancellable polling task
//!   and forwards each sample.
//! - [`TelemetrySink`]: where replies and telemetry go. Implemented for Tokio
//!   channel senders.
//! - [`validation`]: fail-fast validation of configuration payloads.

pub mod command_handler;
pub mod error;
pub mod instrument;
pub mod selection;
pub mod sink;
pub mod validation;

pub use command_handler::{CommandHandler, CommandHandlerBuilder, HandlerState, Instrument};
pub use error::AgentError;
pub use instrument::{EssInstrument, InstrumentState};
pub use selection::{DeviceBackend, select_backend};
pub use sink::{TelemetryRelay, TelemetrySink};
pub use validation::validate_configuration;
