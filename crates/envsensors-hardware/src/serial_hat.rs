//! Raspberry Pi serial hat transport.

use tracing::info;

use crate::serial::{SerialLine, SerialSettings};
use crate::{Result, traits::Device};

/// Instrument wired to one port of the serial hat.
#[derive(Debug)]
pub struct RpiSerialHat {
    name: String,
    serial_port: String,
    line: SerialLine,
}

impl RpiSerialHat {
    /// Create a closed serial hat device on `serial_port`.
    pub fn new(
        name: impl Into<String>,
        serial_port: impl Into<String>,
        settings: SerialSettings,
    ) -> Self {
        let name = name.into();
        Self {
            line: SerialLine::new(name.clone(), settings),
            name,
            serial_port: serial_port.into(),
        }
    }

    /// Path of the serial port.
    pub fn serial_port(&self) -> &str {
        &self.serial_port
    }

    /// Check whether the port is open.
    pub fn is_open(&self) -> bool {
        self.line.is_open()
    }
}

impl Device for RpiSerialHat {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<()> {
        info!(device = %self.name, serial_port = %self.serial_port, "Opening serial hat port");
        self.line.open(&self.serial_port)
    }

    async fn readline(&mut self) -> Result<String> {
        self.line.readline().await
    }

    async fn close(&mut self) -> Result<()> {
        self.line.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_serial_hat_is_closed() {
        let device = RpiSerialHat::new("ess-1", "/dev/ttySC0", SerialSettings::default());
        assert_eq!(device.name(), "ess-1");
        assert_eq!(device.serial_port(), "/dev/ttySC0");
        assert!(!device.is_open());
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let mut device =
            RpiSerialHat::new("ess-1", "/dev/does-not-exist-envsensors", SerialSettings::default());
        assert!(device.open().await.is_err());
        assert!(!device.is_open());
    }

    #[tokio::test]
    async fn test_close_without_open() {
        let mut device = RpiSerialHat::new("ess-1", "/dev/ttySC0", SerialSettings::default());
        device.close().await.unwrap();
        assert!(!device.is_open());
    }
}
