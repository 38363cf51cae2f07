//! TCP socket server for the command protocol.
//!
//! The server accepts one client at a time. Each connection gets its own
//! [`CommandHandler`], so configuration and telemetry state never outlive
//! the client that created them.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────── read half ────────┐
//! Client ◀──▶│                           ▼
//!            │                     CommandHandler ──▶ instruments
//!            │                           │                 │
//!            └─ write half ◀── writer ◀── mpsc ◀───────────┘
//! ```
//!
//! Replies and telemetry share one bounded channel drained by a writer task,
//! so a slow client slows producers down instead of growing memory.
//!
//! # Connection Lifecycle
//!
//! 1. Bind the server with [`SocketServer::bind`]
//! 2. [`SocketServer::run`] accepts a client and serves it until it sends
//!    `disconnect` or `exit`, or closes the socket
//! 3. Running telemetry is stopped when the connection ends
//! 4. `exit` also makes `run` return

use std::net::SocketAddr;
use std::time::Duration;

use envsensors_agent::{AgentError, CommandHandler};
use envsensors_core::constants::{
    DEFAULT_MOCK_READ_INTERVAL_MS, DEFAULT_PORT, MAX_COMMAND_LINE_LENGTH,
    OUTBOUND_CHANNEL_CAPACITY,
};
use envsensors_core::{Command, Message, SimulationMode};
use futures::{SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, trace, warn};

use crate::protocol::{encode_message, parse_command};

type Handler = CommandHandler<mpsc::Sender<Message>>;

/// Configuration for the socket server
///
/// # Example
///
/// ```
/// use envsensors_core::SimulationMode;
/// use envsensors_network::SocketServerConfig;
///
/// let config = SocketServerConfig {
///     bind_addr: "127.0.0.1:5000".parse().unwrap(),
///     simulation_mode: SimulationMode::On,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SocketServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,

    /// Replace every configured device with the mock sensor
    pub simulation_mode: SimulationMode,

    /// Delay between two lines of a mock sensor
    pub mock_read_interval: Duration,

    /// Capacity of the outbound message channel per connection
    pub outbound_capacity: usize,
}

impl Default for SocketServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            simulation_mode: SimulationMode::Off,
            mock_read_interval: Duration::from_millis(DEFAULT_MOCK_READ_INTERVAL_MS),
            outbound_capacity: OUTBOUND_CHANNEL_CAPACITY,
        }
    }
}

/// Errors that can occur during socket server operations
#[derive(Debug, Error)]
pub enum SocketServerError {
    /// Failed to bind to address
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error
    #[error("Codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// Fatal error from the command handler
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// How a served connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The client sent `disconnect` or closed the socket.
    Disconnected,
    /// The client sent `exit`; the server stops.
    Exit,
}

/// TCP server feeding client commands to a command handler
pub struct SocketServer {
    listener: TcpListener,
    config: SocketServerConfig,
}

impl SocketServer {
    /// Bind the server to the configured address
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn bind(config: SocketServerConfig) -> Result<Self, SocketServerError> {
        info!(addr = %config.bind_addr, "Binding socket server");

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| SocketServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        info!(
            addr = %config.bind_addr,
            simulation_mode = %config.simulation_mode,
            "Socket server listening"
        );

        Ok(Self { listener, config })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Server configuration
    pub fn config(&self) -> &SocketServerConfig {
        &self.config
    }

    /// Serve clients one after the other until one sends `exit`
    ///
    /// A connection that fails is logged and the server keeps accepting.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting on the listener fails.
    pub async fn run(&self) -> Result<(), SocketServerError> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!(%peer, "Client connected");

            match self.serve_connection(stream, peer).await {
                Ok(ConnectionOutcome::Exit) => {
                    info!(%peer, "Exit requested, stopping server");
                    return Ok(());
                }
                Ok(ConnectionOutcome::Disconnected) => {
                    info!(%peer, "Client disconnected");
                }
                Err(e) => {
                    error!(%peer, error = %e, "Connection closed on error");
                }
            }
        }
    }

    /// Serve a single connection until it ends
    ///
    /// Running telemetry is stopped before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error on a framing or I/O failure, or when the command
    /// handler fails fatally.
    pub async fn serve_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<ConnectionOutcome, SocketServerError> {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_COMMAND_LINE_LENGTH));
        let (mut sink, mut lines) = framed.split();
        let (tx, mut rx) = mpsc::channel::<Message>(self.config.outbound_capacity.max(1));

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let line = match encode_message(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(%peer, error = %e, "Failed to encode message");
                        continue;
                    }
                };
                trace!(%peer, line = %line, "Writing");
                if let Err(e) = sink.send(line).await {
                    warn!(%peer, error = %e, "Failed to write to client");
                    break;
                }
            }
            debug!(%peer, "Writer finished");
        });

        let mut handler = CommandHandler::builder(tx)
            .simulation_mode(self.config.simulation_mode)
            .mock_read_interval(self.config.mock_read_interval)
            .build();

        let outcome = read_commands(&mut lines, &mut handler, peer).await;

        handler.shutdown().await;
        drop(handler);

        if let Err(e) = writer.await {
            error!(%peer, error = %e, "Writer task failed");
        }
        outcome
    }
}

async fn read_commands<L>(
    lines: &mut L,
    handler: &mut Handler,
    peer: SocketAddr,
) -> Result<ConnectionOutcome, SocketServerError>
where
    L: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(%peer, max = MAX_COMMAND_LINE_LENGTH, "Command line too long, ignoring");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        trace!(%peer, line, "Received");

        let (command, parameters) = match parse_command(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%peer, error = %e, "Ignoring malformed command");
                continue;
            }
        };

        match command {
            Command::Disconnect => return Ok(ConnectionOutcome::Disconnected),
            Command::Exit => return Ok(ConnectionOutcome::Exit),
            _ => {}
        }

        match handler.handle(command, parameters).await {
            Ok(response_code) => debug!(%peer, %command, %response_code, "Command handled"),
            Err(AgentError::InvalidCommand(e)) => {
                warn!(%peer, %command, error = %e, "Ignoring invalid command");
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(%peer, "Client closed the connection");
    Ok(ConnectionOutcome::Disconnected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SocketServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.simulation_mode, SimulationMode::Off);
        assert_eq!(config.mock_read_interval, Duration::from_secs(1));
        assert_eq!(config.outbound_capacity, 100);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = SocketServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };

        let server = SocketServer::bind(config).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_address_in_use() {
        let first = SocketServer::bind(SocketServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();

        let result = SocketServer::bind(SocketServerConfig {
            bind_addr: first.local_addr().unwrap(),
            ..Default::default()
        })
        .await;
        assert!(matches!(result, Err(SocketServerError::Bind { .. })));
    }
}
