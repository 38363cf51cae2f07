//! Mock SEL temperature instrument for testing and development.
//!
//! Produces lines in the instrument's own format so the real decoder can be
//! exercised without hardware.

use std::time::Duration;

use envsensors_core::constants::{
    DEFAULT_MOCK_READ_INTERVAL_MS, DISCONNECTED_VALUE, MOCK_TEMPERATURE_MAX, MOCK_TEMPERATURE_MIN,
};
use rand::Rng;
use tracing::debug;

use crate::{HardwareError, Result, traits::Device};

/// Simulated temperature instrument.
///
/// Every `readline()` waits for the read interval and returns one field per
/// configured channel, `Cnn=tttt.tttt`, with a random temperature between
/// 18 and 30 deg C. A channel can be marked as disconnected, in which case it
/// reports the instrument's disconnected marker instead.
///
/// # Examples
///
/// ```
/// use envsensors_hardware::mock::MockTemperatureSensor;
/// use envsensors_hardware::traits::Device;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> envsensors_hardware::Result<()> {
///     let mut sensor = MockTemperatureSensor::new("ess-1", vec![1, 2])
///         .with_read_interval(Duration::from_millis(1));
///
///     sensor.open().await?;
///     let line = sensor.readline().await?;
///     assert!(line.starts_with("C01="));
///     sensor.close().await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockTemperatureSensor {
    /// Device name
    name: String,

    /// Channel identifiers, one field per channel
    channels: Vec<u32>,

    /// Index of the channel reporting the disconnected marker
    disconnected_channel: Option<usize>,

    /// Delay before each line
    read_interval: Duration,

    /// Whether `open()` was called
    open: bool,
}

impl MockTemperatureSensor {
    /// Create a closed mock sensor with the default read interval.
    pub fn new(name: impl Into<String>, channels: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            channels,
            disconnected_channel: None,
            read_interval: Duration::from_millis(DEFAULT_MOCK_READ_INTERVAL_MS),
            open: false,
        }
    }

    /// Report the disconnected marker for the channel at `index`.
    pub fn with_disconnected_channel(mut self, index: usize) -> Self {
        self.disconnected_channel = Some(index);
        self
    }

    /// Set the delay before each line.
    pub fn with_read_interval(mut self, read_interval: Duration) -> Self {
        self.read_interval = read_interval;
        self
    }

    /// Check whether the sensor is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Channel identifiers.
    pub fn channels(&self) -> &[u32] {
        &self.channels
    }

    fn generate_line(&self) -> String {
        let mut rng = rand::thread_rng();
        self.channels
            .iter()
            .enumerate()
            .map(|(index, channel)| {
                if self.disconnected_channel == Some(index) {
                    format!("C{channel:02}={DISCONNECTED_VALUE}")
                } else {
                    let temperature: f64 = rng.gen_range(MOCK_TEMPERATURE_MIN..MOCK_TEMPERATURE_MAX);
                    format!("C{channel:02}={temperature:09.4}")
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Device for MockTemperatureSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<()> {
        debug!(device = %self.name, "Opening mock temperature sensor");
        self.open = true;
        Ok(())
    }

    async fn readline(&mut self) -> Result<String> {
        if !self.open {
            return Err(HardwareError::disconnected(&self.name));
        }
        tokio::time::sleep(self.read_interval).await;
        Ok(self.generate_line())
    }

    async fn close(&mut self) -> Result<()> {
        debug!(device = %self.name, "Closing mock temperature sensor");
        self.open = false;
        Ok(())
    }
}
