//! Host capability queries.
//!
//! Whether a serial hat can be present depends on the host hardware. The
//! check is behind [`HostPlatform`] so tests can pretend to run on any
//! architecture.

use envsensors_core::constants::SERIAL_HAT_ARCHITECTURE;

/// Reports what the current host is.
pub trait HostPlatform: Send + Sync {
    /// Platform description, e.g. `linux-aarch64`.
    fn platform(&self) -> String;

    /// Check whether the serial hat can be attached to this host.
    fn supports_serial_hat(&self) -> bool {
        self.platform().contains(SERIAL_HAT_ARCHITECTURE)
    }
}

/// The platform the binary was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlatform;

impl HostPlatform for SystemPlatform {
    fn platform(&self) -> String {
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }
}

/// A fixed platform string.
///
/// # Examples
///
/// ```
/// use envsensors_hardware::platform::{HostPlatform, StaticPlatform};
///
/// let pi = StaticPlatform::new("linux-aarch64");
/// assert!(pi.supports_serial_hat());
///
/// let laptop = StaticPlatform::new("linux-x86_64");
/// assert!(!laptop.supports_serial_hat());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPlatform(String);

impl StaticPlatform {
    /// Create a platform reporting `platform`.
    pub fn new(platform: impl Into<String>) -> Self {
        Self(platform.into())
    }
}

impl HostPlatform for StaticPlatform {
    fn platform(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_platform_format() {
        let platform = SystemPlatform.platform();
        assert!(platform.starts_with(std::env::consts::OS));
        assert!(platform.ends_with(std::env::consts::ARCH));
    }

    #[test]
    fn test_system_platform_serial_hat() {
        let expected = std::env::consts::ARCH == "aarch64";
        assert_eq!(SystemPlatform.supports_serial_hat(), expected);
    }

    #[test]
    fn test_static_platform() {
        assert!(StaticPlatform::new("Linux-5.15-aarch64-with-glibc2.31").supports_serial_hat());
        assert!(!StaticPlatform::new("macOS-14-arm64").supports_serial_hat());
    }
}
