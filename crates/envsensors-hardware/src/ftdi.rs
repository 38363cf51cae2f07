//! FTDI virtual COM port transport.
//!
//! The device is configured by the USB serial number of its FTDI adapter and
//! the port path is looked up when the device is opened, so the adapter may
//! be re-plugged between runs.

use serialport::{SerialPortInfo, SerialPortType};
use tracing::info;

use crate::serial::{SerialLine, SerialSettings};
use crate::{HardwareError, Result, traits::Device};

/// Instrument behind an FTDI USB to serial adapter.
#[derive(Debug)]
pub struct VcpFtdi {
    name: String,
    ftdi_id: String,
    line: SerialLine,
}

impl VcpFtdi {
    /// Create a closed FTDI device.
    pub fn new(name: impl Into<String>, ftdi_id: impl Into<String>, settings: SerialSettings) -> Self {
        let name = name.into();
        Self {
            line: SerialLine::new(name.clone(), settings),
            name,
            ftdi_id: ftdi_id.into(),
        }
    }

    /// USB serial number of the adapter.
    pub fn ftdi_id(&self) -> &str {
        &self.ftdi_id
    }

    /// Check whether the port is open.
    pub fn is_open(&self) -> bool {
        self.line.is_open()
    }
}

impl Device for VcpFtdi {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<()> {
        let ports = serialport::available_ports()?;
        let path = find_port_by_serial_number(ports, &self.ftdi_id)
            .ok_or_else(|| HardwareError::not_found(format!("FTDI {}", self.ftdi_id)))?;

        info!(device = %self.name, ftdi_id = %self.ftdi_id, path = %path, "Found FTDI adapter");
        self.line.open(&path)
    }

    async fn readline(&mut self) -> Result<String> {
        self.line.readline().await
    }

    async fn close(&mut self) -> Result<()> {
        self.line.close().await;
        Ok(())
    }
}

/// Path of the USB port whose serial number is `serial_number`.
fn find_port_by_serial_number(ports: Vec<SerialPortInfo>, serial_number: &str) -> Option<String> {
    ports.into_iter().find_map(|port| match port.port_type {
        SerialPortType::UsbPort(usb) if usb.serial_number.as_deref() == Some(serial_number) => {
            Some(port.port_name)
        }
        _ => None,
    })
}
