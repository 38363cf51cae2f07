//! Device and reader trait definitions.
//!
//! Two layers sit between an instrument and the agent:
//!
//! - A [`Device`] is a line oriented transport (mock sensor, FTDI virtual COM
//!   port, serial hat). It knows nothing about the instrument's data format.
//! - A [`SensorReader`] owns a device, decodes its lines and keeps the last
//!   decoded sample as its output.
//!
//! Methods return `impl Future + Send` so readers can be moved into spawned
//! Tokio tasks. Implementations are free to write them as `async fn`.

use std::future::Future;

use envsensors_core::Telemetry;

use crate::error::Result;

/// Line oriented transport to one instrument.
///
/// # Examples
///
/// ```no_run
/// use envsensors_hardware::traits::Device;
/// use envsensors_hardware::error::Result;
///
/// async fn first_line<D: Device>(device: &mut D) -> Result<String> {
///     device.open().await?;
///     let line = device.readline().await?;
///     device.close().await?;
///     Ok(line)
/// }
/// ```
pub trait Device: Send + Sync {
    /// Name of the device, used for diagnostics only.
    fn name(&self) -> &str;

    /// Open the underlying port.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be found or opened.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Read one line, without its terminator.
    ///
    /// Suspends until a full line is available.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The device is not open
    /// - A communication error occurs
    /// - No complete line arrives within the line timeout
    fn readline(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Close the underlying port. Closing a closed device is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the port reports a failure while closing.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Decoder bound to one device, producing one sample per `read()`.
pub trait SensorReader: Send + Sync {
    /// Name shared with the device and the supervising instrument.
    fn name(&self) -> &str;

    /// Open the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened.
    fn start(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Read and decode one sample, replacing [`output`](Self::output).
    ///
    /// # Errors
    ///
    /// Returns an error if the device read fails.
    fn read(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// The last decoded sample, `None` before the first successful read.
    fn output(&self) -> Option<&Telemetry>;

    /// Close the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device fails to close.
    fn stop(&mut self) -> impl Future<Output = Result<()>> + Send;
}
