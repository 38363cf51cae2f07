//! Command dispatcher and telemetry lifecycle.
//!
//! The handler owns the agent's state: the last accepted configuration,
//! the started flag and the set of running instruments. Commands move it
//! through three states:
//!
//! ```text
//!  UNCONFIGURED ──configure──▶ CONFIGURED ──start──▶ STARTED
//!                                 ▲   │                 │
//!                                 │   └──configure──┘   │
//!                                 └───────stop──────────┘
//! ```
//!
//! A rejected command is answered with its response code and leaves the
//! state untouched. A fatal error during `start` (no backend for a device,
//! or a reader that fails to start) stops whatever was already started,
//! sends no reply and propagates to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use envsensors_core::constants::DEFAULT_MOCK_READ_INTERVAL_MS;
use envsensors_core::{
    Command, CommandError, CommandRequest, Configuration, DeviceConfig, DeviceConnection,
    ResponseCode, SimulationMode, Telemetry,
};
use envsensors_hardware::{
    AnyDevice, HostPlatform, MockTemperatureSensor, RpiSerialHat, SelTemperature, SerialSettings,
    SystemPlatform, VcpFtdi,
};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::AgentError;
use crate::instrument::EssInstrument;
use crate::selection::{DeviceBackend, select_backend};
use crate::sink::{TelemetryRelay, TelemetrySink};
use crate::validation::validate_configuration;

/// Instrument type run by the handler.
pub type Instrument<S> = EssInstrument<SelTemperature<AnyDevice>, S>;

/// Externally observable handler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// No configuration accepted yet.
    Unconfigured,
    /// Configuration stored, telemetry off.
    Configured,
    /// Instruments running.
    Started,
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "UNCONFIGURED"),
            Self::Configured => write!(f, "CONFIGURED"),
            Self::Started => write!(f, "STARTED"),
        }
    }
}

/// Builder for [`CommandHandler`].
pub struct CommandHandlerBuilder<S> {
    sink: S,
    simulation_mode: SimulationMode,
    platform: Arc<dyn HostPlatform>,
    serial_settings: SerialSettings,
    mock_read_interval: Duration,
    disconnected_channel: Option<usize>,
}

impl<S: TelemetrySink> CommandHandlerBuilder<S> {
    /// Replace every device with the mock sensor when enabled.
    pub fn simulation_mode(mut self, simulation_mode: SimulationMode) -> Self {
        self.simulation_mode = simulation_mode;
        self
    }

    /// Host platform used to decide whether the serial hat exists.
    pub fn platform(mut self, platform: impl HostPlatform + 'static) -> Self {
        self.platform = Arc::new(platform);
        self
    }

    /// Line settings of the FTDI and serial hat transports.
    pub fn serial_settings(mut self, serial_settings: SerialSettings) -> Self {
        self.serial_settings = serial_settings;
        self
    }

    /// Delay between two lines of the mock sensor.
    pub fn mock_read_interval(mut self, interval: Duration) -> Self {
        self.mock_read_interval = interval;
        self
    }

    /// Report the channel at `index` as disconnected on every mock sensor.
    pub fn disconnected_channel(mut self, index: usize) -> Self {
        self.disconnected_channel = Some(index);
        self
    }

    pub fn build(self) -> CommandHandler<S> {
        CommandHandler {
            relay: TelemetryRelay::new(self.sink),
            simulation_mode: self.simulation_mode,
            platform: self.platform,
            serial_settings: self.serial_settings,
            mock_read_interval: self.mock_read_interval,
            disconnected_channel: self.disconnected_channel,
            configuration: None,
            started: false,
            instruments: Vec::new(),
        }
    }
}

/// Dispatches commands and runs the configured instruments.
///
/// # Examples
///
/// ```no_run
/// use envsensors_agent::CommandHandler;
/// use envsensors_core::{Command, SimulationMode};
/// use serde_json::{Map, Value, json};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), envsensors_agent::AgentError> {
///     let (tx, mut rx) = mpsc::channel(100);
///     let mut handler = CommandHandler::new(tx, SimulationMode::On);
///
///     let parameters: Map<String, Value> = serde_json::from_value(json!({
///         "configuration": {"devices": [
///             {"name": "ess-1", "channels": [1, 2], "type": "FTDI", "ftdi_id": "A601FT68"}
///         ]}
///     }))
///     .unwrap();
///     handler.handle(Command::Configure, parameters).await?;
///     handler.handle(Command::Start, Map::new()).await?;
///
///     while let Some(message) = rx.recv().await {
///         println!("{}", serde_json::to_string(&message).unwrap());
///     }
///     Ok(())
/// }
/// ```
pub struct CommandHandler<S> {
    relay: TelemetryRelay<S>,
    simulation_mode: SimulationMode,
    platform: Arc<dyn HostPlatform>,
    serial_settings: SerialSettings,
    mock_read_interval: Duration,
    disconnected_channel: Option<usize>,
    configuration: Option<Configuration>,
    started: bool,
    instruments: Vec<Instrument<S>>,
}

impl<S: TelemetrySink> CommandHandler<S> {
    /// Create a handler on the running host.
    pub fn new(sink: S, simulation_mode: SimulationMode) -> Self {
        Self::builder(sink).simulation_mode(simulation_mode).build()
    }

    pub fn builder(sink: S) -> CommandHandlerBuilder<S> {
        CommandHandlerBuilder {
            sink,
            simulation_mode: SimulationMode::Off,
            platform: Arc::new(SystemPlatform),
            serial_settings: SerialSettings::default(),
            mock_read_interval: Duration::from_millis(DEFAULT_MOCK_READ_INTERVAL_MS),
            disconnected_channel: None,
        }
    }

    pub fn state(&self) -> HandlerState {
        if self.started {
            HandlerState::Started
        } else if self.configuration.is_some() {
            HandlerState::Configured
        } else {
            HandlerState::Unconfigured
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Last accepted configuration.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// Number of instruments in the active set.
    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    pub fn simulation_mode(&self) -> SimulationMode {
        self.simulation_mode
    }

    /// Handle one command and send its reply.
    ///
    /// Returns the response code that was sent.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`AgentError`] without sending a reply: the command
    /// is unsupported or misses a parameter, or `start` failed to bring up a
    /// device.
    pub async fn handle(
        &mut self,
        command: Command,
        parameters: Map<String, Value>,
    ) -> Result<ResponseCode, AgentError> {
        let request = CommandRequest::new(command, parameters)?;
        self.handle_request(request).await
    }

    /// Handle an already parsed command and send its reply.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub async fn handle_request(
        &mut self,
        request: CommandRequest,
    ) -> Result<ResponseCode, AgentError> {
        let command = request.command();
        info!(%command, state = %self.state(), "Handling command");

        let outcome = match request {
            CommandRequest::Configure { configuration } => {
                self.configure(configuration).map_err(AgentError::from)
            }
            CommandRequest::Start => self.start_sending_telemetry().await,
            CommandRequest::Stop => self
                .stop_sending_telemetry()
                .await
                .map_err(AgentError::from),
        };

        let response_code = match outcome {
            Ok(()) => ResponseCode::Ok,
            Err(AgentError::Command(e)) => {
                warn!(
                    %command,
                    response_code = %e.response_code,
                    reason = %e.message,
                    "Command rejected"
                );
                e.response_code
            }
            Err(e) => {
                error!(%command, error = %e, "Command failed");
                return Err(e);
            }
        };

        self.relay.send_response(response_code).await;
        Ok(response_code)
    }

    /// Validate and store a configuration.
    ///
    /// # Errors
    ///
    /// `ALREADY_STARTED` while telemetry is running, `INVALID_CONFIGURATION`
    /// if validation fails. The stored configuration is unchanged on error.
    pub fn configure(&mut self, configuration: Value) -> Result<(), CommandError> {
        debug!(%configuration, "Received configuration");

        if self.started {
            return Err(CommandError::already_started(
                "Telemetry is running. Stop it before sending a new configuration.",
            ));
        }

        let configuration = validate_configuration(&configuration)?;
        info!(devices = configuration.devices.len(), "Configuration accepted");
        self.configuration = Some(configuration);
        Ok(())
    }

    /// Build an instrument per configured device and start them in order.
    ///
    /// # Errors
    ///
    /// `ALREADY_STARTED` and `NOT_CONFIGURED` are recoverable. A device
    /// without a backend or a reader that fails to start is fatal: the
    /// instruments started so far are stopped and the state stays
    /// `CONFIGURED`.
    pub async fn start_sending_telemetry(&mut self) -> Result<(), AgentError> {
        if self.started {
            return Err(CommandError::already_started(
                "Telemetry is already running. Send a stop first.",
            )
            .into());
        }

        let Some(configuration) = self.configuration.clone() else {
            return Err(CommandError::not_configured(
                "No configuration has been received yet. Ignoring start command.",
            )
            .into());
        };

        if let Err(e) = self.connect_devices(&configuration).await {
            self.disconnect_devices().await;
            return Err(e);
        }

        self.started = true;
        info!(instruments = self.instruments.len(), "Telemetry started");
        Ok(())
    }

    async fn connect_devices(&mut self, configuration: &Configuration) -> Result<(), AgentError> {
        for device_config in &configuration.devices {
            let device = self.resolve_device(device_config)?;
            info!(
                device = %device_config.name,
                transport = device.kind(),
                channels = ?device_config.channels,
                "Connecting device"
            );

            let reader = SelTemperature::new(
                &device_config.name,
                device,
                device_config.channels.clone(),
            );
            let mut instrument =
                EssInstrument::new(&device_config.name, reader, self.relay.clone());
            let started = instrument.start().await;
            self.instruments.push(instrument);

            started.map_err(|source| AgentError::Hardware {
                device: device_config.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Stop every running instrument.
    ///
    /// # Errors
    ///
    /// `NOT_STARTED` if telemetry is not running.
    pub async fn stop_sending_telemetry(&mut self) -> Result<(), CommandError> {
        if !self.started {
            return Err(CommandError::not_started(
                "Telemetry is not running. Ignoring stop command.",
            ));
        }

        self.started = false;
        self.disconnect_devices().await;
        info!("Telemetry stopped");
        Ok(())
    }

    async fn disconnect_devices(&mut self) {
        for mut instrument in std::mem::take(&mut self.instruments) {
            if let Err(e) = instrument.stop().await {
                warn!(device = %instrument.name(), error = %e, "Failed to stop instrument");
            }
        }
    }

    /// Stop telemetry if it is running. Used when the client goes away.
    pub async fn shutdown(&mut self) {
        if self.started {
            info!("Shutting down running telemetry");
            self.started = false;
            self.disconnect_devices().await;
        }
    }

    /// Forward a sample to the sink.
    pub async fn process_sensor_telemetry(&self, telemetry: Telemetry) {
        self.relay.process_sensor_telemetry(telemetry).await;
    }

    /// Construct the transport for a validated device.
    ///
    /// # Errors
    ///
    /// [`AgentError::DeviceUnavailable`] if no backend fits the device on
    /// this host.
    pub fn resolve_device(&self, device: &DeviceConfig) -> Result<AnyDevice, AgentError> {
        let device_type = device.device_type();
        let unavailable = || AgentError::DeviceUnavailable {
            device: device.name.clone(),
            device_type,
            platform: self.platform.platform(),
        };

        let backend = select_backend(self.simulation_mode, device_type, self.platform.as_ref())
            .ok_or_else(unavailable)?;

        let device = match (backend, &device.connection) {
            (DeviceBackend::Mock, _) => {
                let mut sensor = MockTemperatureSensor::new(&device.name, device.channels.clone())
                    .with_read_interval(self.mock_read_interval);
                if let Some(index) = self.disconnected_channel {
                    sensor = sensor.with_disconnected_channel(index);
                }
                AnyDevice::Mock(sensor)
            }
            (DeviceBackend::Ftdi, DeviceConnection::Ftdi { ftdi_id }) => AnyDevice::Ftdi(
                VcpFtdi::new(&device.name, ftdi_id, self.serial_settings.clone()),
            ),
            (DeviceBackend::SerialHat, DeviceConnection::Serial { serial_port }) => {
                AnyDevice::SerialHat(RpiSerialHat::new(
                    &device.name,
                    serial_port,
                    self.serial_settings.clone(),
                ))
            }
            _ => return Err(unavailable()),
        };
        Ok(device)
    }
}

impl<S> fmt::Debug for CommandHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandler")
            .field("simulation_mode", &self.simulation_mode)
            .field("platform", &self.platform.platform())
            .field("configuration", &self.configuration)
            .field("started", &self.started)
            .field("instruments", &self.instruments.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsensors_core::Message;
    use envsensors_hardware::StaticPlatform;
    use serde_json::json;
    use tokio::sync::mpsc;

    type Handler = CommandHandler<mpsc::UnboundedSender<Message>>;

    fn handler(simulation_mode: SimulationMode) -> (Handler, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = CommandHandler::builder(tx)
            .simulation_mode(simulation_mode)
            .platform(StaticPlatform::new("linux-x86_64"))
            .mock_read_interval(Duration::from_millis(10))
            .build();
        (handler, rx)
    }

    fn configuration() -> Value {
        json!({"devices": [
            {"name": "ess-1", "channels": [1, 2, 3], "type": "FTDI", "ftdi_id": "A601FT68"},
            {"name": "ess-2", "channels": [1], "type": "SERIAL", "serial_port": "/dev/ttySC0"}
        ]})
    }

    #[test]
    fn test_initial_state() {
        let (handler, _rx) = handler(SimulationMode::On);
        assert_eq!(handler.state(), HandlerState::Unconfigured);
        assert!(!handler.is_started());
        assert!(handler.configuration().is_none());
        assert_eq!(handler.instrument_count(), 0);
        assert_eq!(handler.simulation_mode(), SimulationMode::On);
    }

    #[test]
    fn test_configure_stores_configuration() {
        let (mut handler, _rx) = handler(SimulationMode::Off);
        handler.configure(configuration()).unwrap();

        assert_eq!(handler.state(), HandlerState::Configured);
        assert_eq!(handler.configuration().unwrap().devices.len(), 2);
    }

    #[test]
    fn test_invalid_configuration_keeps_previous() {
        let (mut handler, _rx) = handler(SimulationMode::Off);
        handler.configure(configuration()).unwrap();

        let error = handler.configure(json!({"devices": []})).unwrap_err();
        assert_eq!(error.response_code, ResponseCode::InvalidConfiguration);
        assert_eq!(handler.configuration().unwrap().devices.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_in_simulation() {
        let (mut handler, _rx) = handler(SimulationMode::On);
        handler.configure(configuration()).unwrap();

        handler.start_sending_telemetry().await.unwrap();
        assert_eq!(handler.state(), HandlerState::Started);
        assert_eq!(handler.instrument_count(), 2);

        handler.stop_sending_telemetry().await.unwrap();
        assert_eq!(handler.state(), HandlerState::Configured);
        assert_eq!(handler.instrument_count(), 0);
    }

    #[tokio::test]
    async fn test_start_without_configuration() {
        let (mut handler, _rx) = handler(SimulationMode::On);

        let error = handler.start_sending_telemetry().await.unwrap_err();
        assert_eq!(error.response_code(), Some(ResponseCode::NotConfigured));
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let (mut handler, _rx) = handler(SimulationMode::On);

        let error = handler.stop_sending_telemetry().await.unwrap_err();
        assert_eq!(error.response_code, ResponseCode::NotStarted);
    }

    #[test]
    fn test_resolve_device_in_simulation() {
        let (handler, _rx) = handler(SimulationMode::On);
        let configuration = validate_configuration(&configuration()).unwrap();

        for device in &configuration.devices {
            let resolved = handler.resolve_device(device).unwrap();
            assert_eq!(resolved.kind(), "mock");
        }
    }

    #[test]
    fn test_resolve_device_without_simulation() {
        let (handler, _rx) = handler(SimulationMode::Off);
        let configuration = validate_configuration(&configuration()).unwrap();

        let ftdi = handler.resolve_device(&configuration.devices[0]).unwrap();
        assert_eq!(ftdi.kind(), "ftdi");

        let error = handler.resolve_device(&configuration.devices[1]).unwrap_err();
        assert!(matches!(
            error,
            AgentError::DeviceUnavailable { ref device, ref platform, .. }
                if device == "ess-2" && platform == "linux-x86_64"
        ));
    }

    #[test]
    fn test_resolve_serial_hat_on_aarch64() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handler = CommandHandler::builder(tx)
            .platform(StaticPlatform::new("linux-aarch64"))
            .build();
        let configuration = validate_configuration(&configuration()).unwrap();

        let hat = handler.resolve_device(&configuration.devices[1]).unwrap();
        assert_eq!(hat.kind(), "serial-hat");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(HandlerState::Unconfigured.to_string(), "UNCONFIGURED");
        assert_eq!(HandlerState::Configured.to_string(), "CONFIGURED");
        assert_eq!(HandlerState::Started.to_string(), "STARTED");
    }
}
