use crate::{
    Result,
    constants::{KEY_CONFIGURATION, KEY_RESPONSE, KEY_TELEMETRY},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Commands accepted by the socket server and the command handler.
///
/// `Disconnect` and `Exit` act on the client connection and the server; the
/// command handler itself only understands `Configure`, `Start` and `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Configure,
    Disconnect,
    Exit,
    Start,
    Stop,
}

impl Command {
    /// Wire name of the command.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Configure => "configure",
            Command::Disconnect => "disconnect",
            Command::Exit => "exit",
            Command::Start => "start",
            Command::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "configure" => Ok(Command::Configure),
            "disconnect" => Ok(Command::Disconnect),
            "exit" => Ok(Command::Exit),
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }
}

/// A command for the command handler together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandRequest {
    /// Validate and store a configuration. The mapping is kept opaque until
    /// the handler validates it.
    Configure { configuration: Value },

    /// Connect the configured devices and start sending telemetry.
    Start,

    /// Stop sending telemetry and disconnect all devices.
    Stop,
}

impl CommandRequest {
    /// Build a request from a command name and its keyword parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingParameter` if `configure` comes without a
    /// `configuration`, and `Error::UnsupportedCommand` for the connection
    /// level commands `disconnect` and `exit`.
    ///
    /// # Examples
    ///
    /// ```
    /// use envsensors_core::{Command, CommandRequest};
    /// use serde_json::{Map, json};
    ///
    /// let mut parameters = Map::new();
    /// parameters.insert("configuration".to_string(), json!({"devices": []}));
    ///
    /// let request = CommandRequest::new(Command::Configure, parameters).unwrap();
    /// assert_eq!(request.command(), Command::Configure);
    ///
    /// assert!(CommandRequest::new(Command::Configure, Map::new()).is_err());
    /// ```
    pub fn new(command: Command, mut parameters: Map<String, Value>) -> Result<Self> {
        match command {
            Command::Configure => {
                let configuration =
                    parameters
                        .remove(KEY_CONFIGURATION)
                        .ok_or(Error::MissingParameter {
                            command,
                            parameter: KEY_CONFIGURATION,
                        })?;
                Ok(CommandRequest::Configure { configuration })
            }
            Command::Start => Ok(CommandRequest::Start),
            Command::Stop => Ok(CommandRequest::Stop),
            Command::Disconnect | Command::Exit => Err(Error::UnsupportedCommand(command)),
        }
    }

    /// The command this request carries.
    #[must_use]
    pub fn command(&self) -> Command {
        match self {
            CommandRequest::Configure { .. } => Command::Configure,
            CommandRequest::Start => Command::Start,
            CommandRequest::Stop => Command::Stop,
        }
    }
}

/// Outcome tag attached to every command reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    Ok,
    NotConfigured,
    AlreadyStarted,
    NotStarted,
    InvalidConfiguration,
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let code = match self {
            ResponseCode::Ok => "OK",
            ResponseCode::NotConfigured => "NOT_CONFIGURED",
            ResponseCode::AlreadyStarted => "ALREADY_STARTED",
            ResponseCode::NotStarted => "NOT_STARTED",
            ResponseCode::InvalidConfiguration => "INVALID_CONFIGURATION",
        };
        f.write_str(code)
    }
}

/// Transport type of a configured device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// FTDI virtual COM port, addressed by its USB serial number.
    #[serde(rename = "FTDI")]
    Ftdi,

    /// Serial port of the Raspberry Pi serial hat.
    #[serde(rename = "SERIAL", alias = "Serial")]
    Serial,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceType::Ftdi => f.write_str("FTDI"),
            DeviceType::Serial => f.write_str("SERIAL"),
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = Error;

    /// Parse a device type. `Serial` is accepted as a legacy spelling.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FTDI" => Ok(DeviceType::Ftdi),
            "SERIAL" | "Serial" => Ok(DeviceType::Serial),
            other => Err(Error::InvalidDeviceType(other.to_string())),
        }
    }
}

/// Whether devices are simulated.
///
/// Only the values `0` (off) and `1` (on) are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    #[default]
    Off,
    On,
}

impl SimulationMode {
    /// Check whether the mock sensor replaces every configured device.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, SimulationMode::On)
    }
}

impl TryFrom<u8> for SimulationMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SimulationMode::Off),
            1 => Ok(SimulationMode::On),
            other => Err(Error::InvalidSimulationMode(other.to_string())),
        }
    }
}

impl std::str::FromStr for SimulationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let value: u8 = s
            .parse()
            .map_err(|_| Error::InvalidSimulationMode(s.to_string()))?;
        SimulationMode::try_from(value)
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationMode::Off => f.write_str("0"),
            SimulationMode::On => f.write_str("1"),
        }
    }
}

/// Type specific connection parameters of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceConnection {
    Ftdi { ftdi_id: String },
    Serial { serial_port: String },
}

/// A validated device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device name, used for diagnostics and in every telemetry sample.
    pub name: String,

    /// Ordered channel identifiers.
    pub channels: Vec<u32>,

    /// Connection parameters matching the declared device type.
    pub connection: DeviceConnection,
}

impl DeviceConfig {
    /// Declared transport type.
    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        match self.connection {
            DeviceConnection::Ftdi { .. } => DeviceType::Ftdi,
            DeviceConnection::Serial { .. } => DeviceType::Serial,
        }
    }
}

/// A validated configuration: a non-empty, ordered list of devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub devices: Vec<DeviceConfig>,
}

/// One decoded sensor sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Name of the device that produced the sample.
    pub name: String,

    /// Time the sample was read.
    pub timestamp: DateTime<Utc>,

    /// One value per configured channel, `None` for a disconnected or
    /// unreadable channel.
    pub values: Vec<Option<f64>>,
}

impl Telemetry {
    /// Create a sample stamped with the current time.
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            values,
        }
    }
}

/// Outbound message delivered to the telemetry sink.
///
/// Serialises as `{"response": "<CODE>"}` or `{"telemetry": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    #[serde(rename = "response")]
    Response(ResponseCode),

    #[serde(rename = "telemetry")]
    Telemetry(Telemetry),
}

impl Message {
    /// Key under which the payload is sent.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Message::Response(_) => KEY_RESPONSE,
            Message::Telemetry(_) => KEY_TELEMETRY,
        }
    }

    /// Response code if this is a command reply.
    #[must_use]
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self {
            Message::Response(code) => Some(*code),
            Message::Telemetry(_) => None,
        }
    }
}
