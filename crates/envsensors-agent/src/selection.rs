//! Device backend selection.

use envsensors_core::{DeviceType, SimulationMode};
use envsensors_hardware::HostPlatform;

/// Transport used for a configured device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBackend {
    Mock,
    Ftdi,
    SerialHat,
}

/// Pick the backend for a device of `device_type`.
///
/// Simulation mode replaces every device with the mock sensor. A serial
/// device needs the serial hat, which only exists on an `aarch64` host.
/// Returns `None` when no backend fits.
pub fn select_backend(
    simulation_mode: SimulationMode,
    device_type: DeviceType,
    platform: &dyn HostPlatform,
) -> Option<DeviceBackend> {
    if simulation_mode.is_enabled() {
        return Some(DeviceBackend::Mock);
    }

    match device_type {
        DeviceType::Ftdi => Some(DeviceBackend::Ftdi),
        DeviceType::Serial if platform.supports_serial_hat() => Some(DeviceBackend::SerialHat),
        DeviceType::Serial => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsensors_hardware::StaticPlatform;
    use rstest::rstest;

    #[rstest]
    #[case(SimulationMode::On, DeviceType::Ftdi, "linux-x86_64", Some(DeviceBackend::Mock))]
    #[case(SimulationMode::On, DeviceType::Serial, "linux-x86_64", Some(DeviceBackend::Mock))]
    #[case(SimulationMode::Off, DeviceType::Ftdi, "linux-x86_64", Some(DeviceBackend::Ftdi))]
    #[case(SimulationMode::Off, DeviceType::Ftdi, "linux-aarch64", Some(DeviceBackend::Ftdi))]
    #[case(SimulationMode::Off, DeviceType::Serial, "linux-aarch64", Some(DeviceBackend::SerialHat))]
    #[case(SimulationMode::Off, DeviceType::Serial, "Linux-6.1.21-v8+-aarch64-with-glibc2.31", Some(DeviceBackend::SerialHat))]
    #[case(SimulationMode::Off, DeviceType::Serial, "linux-x86_64", None)]
    #[case(SimulationMode::Off, DeviceType::Serial, "macos-arm64", None)]
    fn test_select_backend(
        #[case] simulation_mode: SimulationMode,
        #[case] device_type: DeviceType,
        #[case] platform: &str,
        #[case] expected: Option<DeviceBackend>,
    ) {
        let platform = StaticPlatform::new(platform);
        assert_eq!(select_backend(simulation_mode, device_type, &platform), expected);
    }
}
