//! Enum wrapper for device dispatch.
//!
//! The device traits use `impl Future` returns and are therefore not object
//! safe. [`AnyDevice`] closes the set of transports instead, so the agent can
//! hold any of them behind one concrete type.
//!
//! # Examples
//!
//! ```
//! use envsensors_hardware::devices::AnyDevice;
//! use envsensors_hardware::mock::MockTemperatureSensor;
//! use envsensors_hardware::traits::Device;
//!
//! let device = AnyDevice::Mock(MockTemperatureSensor::new("ess-1", vec![1, 2]));
//! assert_eq!(device.name(), "ess-1");
//! ```

use crate::ftdi::VcpFtdi;
use crate::mock::MockTemperatureSensor;
use crate::serial_hat::RpiSerialHat;
use crate::traits::Device;
use crate::Result;

/// One of the supported transports.
#[derive(Debug)]
pub enum AnyDevice {
    /// Simulated instrument for development and testing.
    Mock(MockTemperatureSensor),

    /// FTDI virtual COM port.
    Ftdi(VcpFtdi),

    /// Raspberry Pi serial hat port.
    SerialHat(RpiSerialHat),
}

impl AnyDevice {
    /// Short transport label for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mock(_) => "mock",
            Self::Ftdi(_) => "ftdi",
            Self::SerialHat(_) => "serial-hat",
        }
    }
}

impl Device for AnyDevice {
    fn name(&self) -> &str {
        match self {
            Self::Mock(device) => device.name(),
            Self::Ftdi(device) => device.name(),
            Self::SerialHat(device) => device.name(),
        }
    }

    async fn open(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.open().await,
            Self::Ftdi(device) => device.open().await,
            Self::SerialHat(device) => device.open().await,
        }
    }

    async fn readline(&mut self) -> Result<String> {
        match self {
            Self::Mock(device) => device.readline().await,
            Self::Ftdi(device) => device.readline().await,
            Self::SerialHat(device) => device.readline().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.close().await,
            Self::Ftdi(device) => device.close().await,
            Self::SerialHat(device) => device.close().await,
        }
    }
}

impl From<MockTemperatureSensor> for AnyDevice {
    fn from(device: MockTemperatureSensor) -> Self {
        Self::Mock(device)
    }
}

impl From<VcpFtdi> for AnyDevice {
    fn from(device: VcpFtdi) -> Self {
        Self::Ftdi(device)
    }
}

impl From<RpiSerialHat> for AnyDevice {
    fn from(device: RpiSerialHat) -> Self {
        Self::SerialHat(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::SerialSettings;
    use std::time::Duration;

    #[tokio::test]
    async fn test_any_device_mock() {
        let sensor =
            MockTemperatureSensor::new("ess-1", vec![1]).with_read_interval(Duration::from_millis(1));
        let mut device = AnyDevice::from(sensor);

        assert_eq!(device.kind(), "mock");
        device.open().await.unwrap();
        let line = device.readline().await.unwrap();
        assert!(line.starts_with("C01="));
        device.close().await.unwrap();
    }

    #[test]
    fn test_any_device_kinds() {
        let ftdi = AnyDevice::from(VcpFtdi::new("a", "A601FT68", SerialSettings::default()));
        let hat = AnyDevice::from(RpiSerialHat::new("b", "/dev/ttySC0", SerialSettings::default()));

        assert_eq!(ftdi.kind(), "ftdi");
        assert_eq!(ftdi.name(), "a");
        assert_eq!(hat.kind(), "serial-hat");
        assert_eq!(hat.name(), "b");
    }
}
