//! Decoder for the SEL multi-channel temperature instrument.
//!
//! The instrument writes one line per measurement cycle with one field per
//! channel:
//!
//! ```text
//! C01=0021.1234,C02=0021.5678,C03=9999.9990
//! ```
//!
//! `9999.9990` marks a disconnected channel. Fields are matched to the
//! configured channels by position.

use envsensors_core::Telemetry;
use envsensors_core::constants::DISCONNECTED_VALUE;
use tracing::{debug, warn};

use crate::Result;
use crate::traits::{Device, SensorReader};

/// Temperature reader bound to one device and its configured channels.
///
/// # Examples
///
/// ```
/// use envsensors_hardware::mock::MockTemperatureSensor;
/// use envsensors_hardware::sel_temperature::SelTemperature;
/// use envsensors_hardware::traits::SensorReader;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> envsensors_hardware::Result<()> {
///     let sensor = MockTemperatureSensor::new("ess-1", vec![1, 2])
///         .with_read_interval(Duration::from_millis(1));
///     let mut reader = SelTemperature::new("ess-1", sensor, vec![1, 2]);
///
///     reader.start().await?;
///     reader.read().await?;
///     assert_eq!(reader.output().unwrap().values.len(), 2);
///     reader.stop().await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SelTemperature<D> {
    name: String,
    device: D,
    channels: Vec<u32>,
    output: Option<Telemetry>,
}

impl<D: Device> SelTemperature<D> {
    /// Create a reader over `device` for `channels`.
    pub fn new(name: impl Into<String>, device: D, channels: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            device,
            channels,
            output: None,
        }
    }

    /// The wrapped device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Configured channel identifiers.
    pub fn channels(&self) -> &[u32] {
        &self.channels
    }
}

impl<D: Device> SensorReader for SelTemperature<D> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<()> {
        debug!(reader = %self.name, "Starting temperature reader");
        self.device.open().await
    }

    async fn read(&mut self) -> Result<()> {
        let line = self.device.readline().await?;
        let values = decode_line(&self.name, &line, self.channels.len());
        self.output = Some(Telemetry::new(&self.name, values));
        Ok(())
    }

    fn output(&self) -> Option<&Telemetry> {
        self.output.as_ref()
    }

    async fn stop(&mut self) -> Result<()> {
        debug!(reader = %self.name, "Stopping temperature reader");
        self.device.close().await
    }
}

/// Decode one instrument line into `channel_count` values.
///
/// Disconnected and unparsable channels decode to `None`. A line with the
/// wrong number of fields is padded or truncated.
fn decode_line(name: &str, line: &str, channel_count: usize) -> Vec<Option<f64>> {
    let mut values: Vec<Option<f64>> = line.trim().split(',').map(decode_field).collect();

    if values.len() != channel_count {
        warn!(
            reader = %name,
            expected = channel_count,
            received = values.len(),
            line = %line,
            "Unexpected number of channels"
        );
        values.resize(channel_count, None);
    }
    values
}

fn decode_field(field: &str) -> Option<f64> {
    let raw = match field.split_once('=') {
        Some((_, value)) => value,
        None => field,
    }
    .trim();

    if raw == DISCONNECTED_VALUE {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}
