//! Network layer for the environmental sensor agent
//!
//! This crate exposes a [`CommandHandler`](envsensors_agent::CommandHandler)
//! over TCP. Commands arrive as newline-delimited JSON objects, replies and
//! telemetry go back the same way.
//!
//! # Components
//!
//! - **SocketServer**: accepts one client at a time and runs a command
//!   handler per connection
//! - **protocol**: parsing of inbound command lines and encoding of outbound
//!   messages
//!
//! # Example
//!
//! ```no_run
//! use envsensors_network::{SocketServer, SocketServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = SocketServer::bind(SocketServerConfig::default()).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod protocol;
mod server;

pub use protocol::{InboundCommand, encode_message, parse_command};
pub use server::{ConnectionOutcome, SocketServer, SocketServerConfig, SocketServerError};
