//! Device abstraction layer for the environmental sensor telemetry agent.
//!
//! This crate provides the transports and decoders the agent reads sensor
//! data through, plus a mock instrument for development and testing.
//!
//! # Layers
//!
//! - [`Device`]: a line oriented transport. Implemented by
//!   [`MockTemperatureSensor`], [`VcpFtdi`] (FTDI virtual COM port, located
//!   by USB serial number) and [`RpiSerialHat`] (Raspberry Pi serial hat).
//! - [`AnyDevice`]: closed enum over the transports, used wherever a concrete
//!   type is needed.
//! - [`SensorReader`]: a decoder owning a device. [`SelTemperature`] turns
//!   each instrument line into a [`Telemetry`](envsensors_core::Telemetry)
//!   sample.
//! - [`HostPlatform`]: host capability queries, used to decide whether the
//!   serial hat can exist on this machine.
//!
//! # Design Philosophy
//!
//! - **Async-first**: all I/O methods return `impl Future + Send`, so readers
//!   can run inside spawned Tokio tasks. Blocking serial I/O is moved onto
//!   the blocking pool.
//! - **Enum dispatch**: the traits are not object safe; [`AnyDevice`] gives
//!   a concrete type instead of `Box<dyn Device>`.
//! - **Error-aware**: all operations return [`Result<T>`] with
//!   [`HardwareError`].
//!
//! # Example
//!
//! ```no_run
//! use envsensors_hardware::{AnyDevice, SelTemperature, SensorReader, MockTemperatureSensor};
//!
//! #[tokio::main]
//! async fn main() -> envsensors_hardware::Result<()> {
//!     let device = AnyDevice::from(MockTemperatureSensor::new("ess-1", vec![1, 2, 3]));
//!     let mut reader = SelTemperature::new("ess-1", device, vec![1, 2, 3]);
//!
//!     reader.start().await?;
//!     reader.read().await?;
//!     println!("{:?}", reader.output());
//!     reader.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! [`Device`]: traits::Device
//! [`SensorReader`]: traits::SensorReader

pub mod devices;
pub mod error;
pub mod ftdi;
pub mod mock;
pub mod platform;
pub mod sel_temperature;
pub mod serial;
pub mod serial_hat;
pub mod traits;

// Re-export commonly used types for convenience
pub use devices::AnyDevice;
pub use error::{HardwareError, Result};
pub use ftdi::VcpFtdi;
pub use mock::MockTemperatureSensor;
pub use platform::{HostPlatform, StaticPlatform, SystemPlatform};
pub use sel_temperature::SelTemperature;
pub use serial::SerialSettings;
pub use serial_hat::RpiSerialHat;
pub use traits::{Device, SensorReader};
