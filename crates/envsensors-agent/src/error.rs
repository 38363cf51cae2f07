//! Error types of the command handler.
//!
//! [`AgentError::Command`] is the recoverable class: it carries a response
//! code and is turned into a command reply. Every other variant is fatal for
//! the operation that raised it and propagates to the caller.

use envsensors_core::{CommandError, DeviceType};
use envsensors_hardware::HardwareError;
use thiserror::Error;

/// Errors raised while handling a command.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Validation or state precondition failure, answered with a reply.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// No device backend exists for a validated device on this host.
    #[error(
        "Could not get a {device_type} device for {device} on platform {platform}. Please check the configuration."
    )]
    DeviceUnavailable {
        device: String,
        device_type: DeviceType,
        platform: String,
    },

    /// A reader failed to start or stop.
    #[error("Hardware error on {device}: {source}")]
    Hardware {
        device: String,
        #[source]
        source: HardwareError,
    },

    /// The command or its parameters are malformed.
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] envsensors_core::Error),
}

impl AgentError {
    /// Check whether this error must not be answered with a reply.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Command(_))
    }

    /// Response code of a recoverable error.
    pub fn response_code(&self) -> Option<envsensors_core::ResponseCode> {
        match self {
            Self::Command(error) => Some(error.response_code),
            _ => None,
        }
    }
}
