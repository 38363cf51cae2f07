use thiserror::Error;

use crate::types::{Command, ResponseCode};

/// Errors raised while building commands or shared values.
///
/// These are programming or deployment errors. They never turn into a
/// command reply.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command {command} requires parameter {parameter}")]
    MissingParameter {
        command: Command,
        parameter: &'static str,
    },

    #[error("Command {0} is handled by the connection, not the command handler")]
    UnsupportedCommand(Command),

    #[error("Invalid simulation mode {0}, expected 0 or 1")]
    InvalidSimulationMode(String),

    #[error("Invalid device type: {0}")]
    InvalidDeviceType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable error raised by a command handler.
///
/// Carries the response code that is sent back to the client instead of the
/// error itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({response_code})")]
pub struct CommandError {
    /// Code reported in the command reply.
    pub response_code: ResponseCode,

    /// Human readable reason, logged but not sent.
    pub message: String,
}

impl CommandError {
    /// Create a new command error.
    pub fn new(response_code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            response_code,
            message: message.into(),
        }
    }

    /// Create an `INVALID_CONFIGURATION` error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::InvalidConfiguration, message)
    }

    /// Create an `ALREADY_STARTED` error.
    pub fn already_started(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::AlreadyStarted, message)
    }

    /// Create a `NOT_CONFIGURED` error.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::NotConfigured, message)
    }

    /// Create a `NOT_STARTED` error.
    pub fn not_started(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::NotStarted, message)
    }
}
