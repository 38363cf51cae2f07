//! Core constants for the telemetry agent.
//!
//! This module centralises the JSON keys used on the wire and in the device
//! configuration, the values emitted by the SEL temperature instrument, and
//! the defaults shared by the transports and the socket server.
//!
//! # Wire Format
//!
//! Commands and replies are exchanged as one JSON object per line:
//!
//! ```text
//! -> {"command": "configure", "parameters": {"configuration": {"devices": [...]}}}
//! <- {"response": "OK"}
//! <- {"telemetry": {"name": "ess-1", "timestamp": "...", "values": [21.5, null]}}
//! ```
//!
//! # Usage
//!
//! ```
//! use envsensors_core::constants::*;
//!
//! assert_eq!(KEY_DEVICES, "devices");
//! assert_eq!(SERIAL_HAT_ARCHITECTURE, "aarch64");
//! ```

// ============================================================================
// Message Keys
// ============================================================================

/// Parameter of the `configure` command holding the configuration mapping.
pub const KEY_CONFIGURATION: &str = "configuration";

/// Key of a command reply.
pub const KEY_RESPONSE: &str = "response";

/// Key of a telemetry envelope.
pub const KEY_TELEMETRY: &str = "telemetry";

// ============================================================================
// Configuration Keys
// ============================================================================

/// The only top-level key allowed in a configuration.
pub const KEY_DEVICES: &str = "devices";

/// Device name, unique within one configuration.
pub const KEY_NAME: &str = "name";

/// Ordered channel identifiers of a device.
pub const KEY_CHANNELS: &str = "channels";

/// Device transport type (`FTDI` or `SERIAL`).
pub const KEY_TYPE: &str = "type";

/// USB serial number of an FTDI virtual COM port. Required for `FTDI`.
pub const KEY_FTDI_ID: &str = "ftdi_id";

/// Serial port path of a serial-hat device. Required for `SERIAL`.
pub const KEY_SERIAL_PORT: &str = "serial_port";

// ============================================================================
// Instrument Values
// ============================================================================

/// The value emitted by a disconnected channel.
///
/// # Examples
///
/// ```
/// use envsensors_core::constants::DISCONNECTED_VALUE;
///
/// let field = "C03=9999.9990";
/// assert!(field.ends_with(DISCONNECTED_VALUE));
/// ```
pub const DISCONNECTED_VALUE: &str = "9999.9990";

/// Lower bound (deg C) of the temperatures produced by the mock sensor.
pub const MOCK_TEMPERATURE_MIN: f64 = 18.0;

/// Upper bound (deg C, exclusive) of the temperatures produced by the mock sensor.
pub const MOCK_TEMPERATURE_MAX: f64 = 30.0;

/// Default delay between two lines of the mock sensor, in milliseconds.
///
/// Matches the roughly 1 Hz output rate of the real instrument.
pub const DEFAULT_MOCK_READ_INTERVAL_MS: u64 = 1000;

// ============================================================================
// Transport Defaults
// ============================================================================

/// Platform substring identifying a host that carries the serial hat.
pub const SERIAL_HAT_ARCHITECTURE: &str = "aarch64";

/// Baud rate of the SEL temperature instrument.
pub const DEFAULT_BAUD_RATE: u32 = 19200;

/// Maximum time to wait for one complete line from a serial device, in milliseconds.
pub const DEFAULT_LINE_TIMEOUT_MS: u64 = 5000;

/// Maximum accepted length of one line read from a serial device.
pub const MAX_DEVICE_LINE_LENGTH: usize = 4096;

// ============================================================================
// Socket Server Defaults
// ============================================================================

/// Default TCP port of the socket server.
pub const DEFAULT_PORT: u16 = 5000;

/// Default bind host of the socket server.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Maximum accepted length of one inbound command line.
pub const MAX_COMMAND_LINE_LENGTH: usize = 64 * 1024;

/// Capacity of the outbound message channel of one client connection.
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 100;
