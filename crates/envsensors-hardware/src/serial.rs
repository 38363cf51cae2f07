//! Line reader over a serial port.
//!
//! The `serialport` crate is synchronous, so reads run on Tokio's blocking
//! pool. A read whose caller is cancelled keeps running on that pool; its
//! handle is kept so the next `readline` picks up its result, and `close`
//! interrupts it and waits for it before releasing the port.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use envsensors_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_LINE_TIMEOUT_MS, MAX_DEVICE_LINE_LENGTH};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{HardwareError, Result};

/// Internal read timeout of the port. Bounds how long a close waits for an
/// in-flight read.
const PORT_POLL_TIMEOUT_MS: u64 = 100;

/// Serial line settings shared by the FTDI and serial hat transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate, 8N1 framing is implied.
    pub baud_rate: u32,

    /// Maximum time to wait for one complete line.
    pub line_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            line_timeout: Duration::from_millis(DEFAULT_LINE_TIMEOUT_MS),
        }
    }
}

struct PortState {
    port: Box<dyn SerialPort>,
    buffer: Vec<u8>,
}

/// An optionally open serial port returning CR/LF terminated lines.
pub struct SerialLine {
    name: String,
    settings: SerialSettings,
    state: Option<Arc<Mutex<PortState>>>,
    interrupt: Arc<AtomicBool>,
    pending: Option<JoinHandle<Result<String>>>,
}

impl SerialLine {
    /// Create a closed line reader.
    pub fn new(name: impl Into<String>, settings: SerialSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            state: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            pending: None,
        }
    }

    /// Check whether a port is open.
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Line settings.
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Open the port at `path`, replacing any port already open.
    ///
    /// A read still running on a replaced port is interrupted and detached.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened.
    pub fn open(&mut self, path: &str) -> Result<()> {
        let port = serialport::new(path, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(PORT_POLL_TIMEOUT_MS))
            .open()?;

        debug!(
            device = %self.name,
            path,
            baud_rate = self.settings.baud_rate,
            "Serial port opened"
        );

        self.interrupt.store(true, Ordering::Relaxed);
        self.interrupt = Arc::new(AtomicBool::new(false));
        self.pending = None;
        self.state = Some(Arc::new(Mutex::new(PortState {
            port,
            buffer: Vec::new(),
        })));
        Ok(())
    }

    /// Read one line without its terminator.
    ///
    /// Cancel safe: if the returned future is dropped, the read continues in
    /// the background and the next call returns its line.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is not open, the read fails, or no
    /// complete line arrives within the line timeout.
    pub async fn readline(&mut self) -> Result<String> {
        if self.pending.is_none() {
            let state = self
                .state
                .clone()
                .ok_or_else(|| HardwareError::disconnected(&self.name))?;
            let interrupt = self.interrupt.clone();
            let timeout = self.settings.line_timeout;

            self.pending = Some(tokio::task::spawn_blocking(move || {
                let mut state = state.blocking_lock();
                read_line_blocking(&mut state, timeout, &interrupt)
            }));
        }
        let Some(handle) = self.pending.as_mut() else {
            return Err(HardwareError::disconnected(&self.name));
        };

        let joined = handle.await;
        self.pending = None;

        let line = joined
            .map_err(|e| HardwareError::communication(format!("Serial read task failed: {e}")))??;

        trace!(device = %self.name, line = %line, "Read line");
        Ok(line)
    }

    /// Close the port. Closing a closed port is a no-op.
    ///
    /// An in-flight read is interrupted and awaited first, so no read is
    /// running on the port once this returns.
    pub async fn close(&mut self) {
        self.interrupt.store(true, Ordering::Relaxed);

        if let Some(handle) = self.pending.take() {
            match handle.await {
                Ok(Ok(line)) => debug!(device = %self.name, line = %line, "Discarding line read during close"),
                Ok(Err(e)) => trace!(device = %self.name, error = %e, "In-flight read ended"),
                Err(e) => warn!(device = %self.name, error = %e, "In-flight read task failed"),
            }
        }

        if self.state.take().is_some() {
            debug!(device = %self.name, "Serial port closed");
        }
    }
}

impl fmt::Debug for SerialLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLine")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .field("reading", &self.pending.is_some())
            .finish()
    }
}

fn read_line_blocking(
    state: &mut PortState,
    timeout: Duration,
    interrupt: &AtomicBool,
) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; 256];

    loop {
        if let Some(line) = take_line(&mut state.buffer) {
            return Ok(line);
        }
        if state.buffer.len() > MAX_DEVICE_LINE_LENGTH {
            state.buffer.clear();
            return Err(HardwareError::invalid_data(format!(
                "Line exceeds {MAX_DEVICE_LINE_LENGTH} bytes"
            )));
        }
        if interrupt.load(Ordering::Relaxed) {
            return Err(HardwareError::communication("Read interrupted by close"));
        }
        if Instant::now() >= deadline {
            return Err(HardwareError::timeout(timeout.as_millis() as u64));
        }

        match state.port.read(&mut chunk) {
            // The port only returns 0 bytes once the other end hung up
            Ok(0) => return Err(HardwareError::communication("Port hung up")),
            Ok(n) => state.buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
    }
}

/// Remove the first `\n` terminated line from `buffer`, stripping `\r\n`.
fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
    let end = buffer.iter().position(|b| *b == b'\n')?;
    let raw: Vec<u8> = buffer.drain(..=end).collect();
    let line = String::from_utf8_lossy(&raw);
    Some(line.trim_end_matches(['\r', '\n']).to_string())
}
