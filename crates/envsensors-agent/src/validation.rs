//! Configuration validation.
//!
//! Validation is fail-fast: checks run in a fixed order and the first
//! failure is returned. Every failure is an `INVALID_CONFIGURATION` error.
//!
//! Order of checks:
//! 1. The configuration is a mapping with exactly one key, `devices`.
//! 2. `devices` is a non-empty list.
//! 3. Per device, in list order: mandatory keys, device type, type specific
//!    connection key, then the shape of each value.
//! 4. Device names are unique.

use std::collections::HashSet;

use envsensors_core::constants::{
    KEY_CHANNELS, KEY_DEVICES, KEY_FTDI_ID, KEY_NAME, KEY_SERIAL_PORT, KEY_TYPE,
};
use envsensors_core::{CommandError, Configuration, DeviceConfig, DeviceConnection, DeviceType};
use serde_json::{Map, Value};

type Result<T> = std::result::Result<T, CommandError>;

/// Validate a raw configuration payload.
///
/// # Errors
///
/// Returns an `INVALID_CONFIGURATION` [`CommandError`] describing the first
/// failed check.
///
/// # Examples
///
/// ```
/// use envsensors_agent::validation::validate_configuration;
/// use serde_json::json;
///
/// let configuration = validate_configuration(&json!({
///     "devices": [{"name": "ess-1", "channels": [1, 2], "type": "FTDI", "ftdi_id": "A601FT68"}]
/// }))
/// .unwrap();
/// assert_eq!(configuration.devices[0].channels, vec![1, 2]);
///
/// assert!(validate_configuration(&json!({"devices": []})).is_err());
/// ```
pub fn validate_configuration(configuration: &Value) -> Result<Configuration> {
    let Some(map) = configuration.as_object() else {
        return Err(invalid("The configuration must be a mapping."));
    };

    let Some(devices) = map.get(KEY_DEVICES) else {
        return Err(invalid(format!(
            "Missing configuration key {KEY_DEVICES}."
        )));
    };

    if map.len() != 1 {
        return Err(invalid(format!(
            "Expected exactly one configuration key but got {}.",
            map.len()
        )));
    }

    let devices = match devices.as_array() {
        Some(devices) if !devices.is_empty() => devices,
        _ => {
            return Err(invalid(format!(
                "The configuration data for key {KEY_DEVICES} must be a non-empty list."
            )));
        }
    };

    let mut names = HashSet::with_capacity(devices.len());
    let mut validated = Vec::with_capacity(devices.len());

    for (index, device) in devices.iter().enumerate() {
        let device = validate_device(index, device)?;
        if !names.insert(device.name.clone()) {
            return Err(invalid(format!(
                "Duplicate device name {}.",
                device.name
            )));
        }
        validated.push(device);
    }

    Ok(Configuration { devices: validated })
}

fn validate_device(index: usize, device: &Value) -> Result<DeviceConfig> {
    let Some(map) = device.as_object() else {
        return Err(invalid(format!(
            "Device configuration {index} must be a mapping."
        )));
    };

    if [KEY_NAME, KEY_CHANNELS, KEY_TYPE]
        .iter()
        .any(|key| !map.contains_key(*key))
    {
        return Err(invalid(format!(
            "The configuration keys {KEY_NAME}, {KEY_CHANNELS} and {KEY_TYPE} are mandatory \
             for device configuration {index}."
        )));
    }

    let device_type = map[KEY_TYPE]
        .as_str()
        .and_then(|value| value.parse::<DeviceType>().ok())
        .ok_or_else(|| {
            invalid(format!(
                "The value for key {KEY_TYPE} of device configuration {index} must be \
                 {} or {}.",
                DeviceType::Ftdi,
                DeviceType::Serial
            ))
        })?;

    let connection_key = match device_type {
        DeviceType::Ftdi => KEY_FTDI_ID,
        DeviceType::Serial => KEY_SERIAL_PORT,
    };
    let Some(connection_value) = map.get(connection_key) else {
        return Err(invalid(format!(
            "Missing configuration key {connection_key} for {device_type} device \
             configuration {index}."
        )));
    };

    let name = required_string(map, KEY_NAME, index)?;
    let channels = parse_channels(&map[KEY_CHANNELS], index)?;

    let Some(connection_value) = connection_value.as_str() else {
        return Err(invalid(format!(
            "The value for key {connection_key} of device configuration {index} must be a string."
        )));
    };
    let connection = match device_type {
        DeviceType::Ftdi => DeviceConnection::Ftdi {
            ftdi_id: connection_value.to_string(),
        },
        DeviceType::Serial => DeviceConnection::Serial {
            serial_port: connection_value.to_string(),
        },
    };

    Ok(DeviceConfig {
        name,
        channels,
        connection,
    })
}

fn required_string(map: &Map<String, Value>, key: &str, index: usize) -> Result<String> {
    match map.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(invalid(format!(
            "The value for key {key} of device configuration {index} must be a non-empty string."
        ))),
    }
}

fn parse_channels(value: &Value, index: usize) -> Result<Vec<u32>> {
    let error = || {
        invalid(format!(
            "The value for key {KEY_CHANNELS} of device configuration {index} must be a \
             non-empty list of channel numbers."
        ))
    };

    let channels = value.as_array().filter(|list| !list.is_empty()).ok_or_else(error)?;
    channels
        .iter()
        .map(|channel| {
            channel
                .as_u64()
                .and_then(|channel| u32::try_from(channel).ok())
                .ok_or_else(error)
        })
        .collect()
}

fn invalid(message: impl Into<String>) -> CommandError {
    CommandError::invalid_configuration(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsensors_core::ResponseCode;
    use rstest::rstest;
    use serde_json::json;

    fn ftdi_device(name: &str) -> Value {
        json!({"name": name, "channels": [1, 2, 3], "type": "FTDI", "ftdi_id": "A601FT68"})
    }

    fn serial_device(name: &str) -> Value {
        json!({"name": name, "channels": [1], "type": "SERIAL", "serial_port": "/dev/ttySC0"})
    }

    fn assert_invalid(configuration: Value, fragment: &str) {
        let error = validate_configuration(&configuration).unwrap_err();
        assert_eq!(error.response_code, ResponseCode::InvalidConfiguration);
        assert!(
            error.message.contains(fragment),
            "message {:?} does not contain {fragment:?}",
            error.message
        );
    }

    #[test]
    fn test_valid_configuration() {
        let configuration = validate_configuration(&json!({
            "devices": [ftdi_device("ess-1"), serial_device("ess-2")]
        }))
        .unwrap();

        assert_eq!(configuration.devices.len(), 2);
        assert_eq!(configuration.devices[0].name, "ess-1");
        assert_eq!(configuration.devices[0].channels, vec![1, 2, 3]);
        assert_eq!(
            configuration.devices[0].connection,
            DeviceConnection::Ftdi {
                ftdi_id: "A601FT68".to_string()
            }
        );
        assert_eq!(configuration.devices[1].device_type(), DeviceType::Serial);
    }

    #[test]
    fn test_extra_device_keys_are_ignored() {
        let mut device = ftdi_device("ess-1");
        device["location"] = json!("lab");
        device["serial_port"] = json!("/dev/ttyUSB0");

        let configuration = validate_configuration(&json!({"devices": [device]})).unwrap();
        assert_eq!(configuration.devices[0].device_type(), DeviceType::Ftdi);
    }

    #[test]
    fn test_serial_alias_type() {
        let mut device = serial_device("ess-1");
        device["type"] = json!("Serial");

        let configuration = validate_configuration(&json!({"devices": [device]})).unwrap();
        assert_eq!(configuration.devices[0].device_type(), DeviceType::Serial);
    }

    #[rstest]
    #[case::not_a_mapping(json!([1, 2]), "must be a mapping")]
    #[case::missing_devices(json!({}), "Missing configuration key devices")]
    #[case::wrong_key(json!({"instruments": []}), "Missing configuration key devices")]
    #[case::extra_key(json!({"devices": [ftdi_device("a")], "extra": 1}), "exactly one configuration key")]
    #[case::empty_devices(json!({"devices": []}), "non-empty list")]
    #[case::devices_not_a_list(json!({"devices": "a"}), "non-empty list")]
    fn test_invalid_top_level(#[case] configuration: Value, #[case] fragment: &str) {
        assert_invalid(configuration, fragment);
    }

    #[rstest]
    #[case::not_a_mapping(json!("ess-1"), "must be a mapping")]
    #[case::missing_name(json!({"channels": [1], "type": "FTDI", "ftdi_id": "x"}), "are mandatory")]
    #[case::missing_channels(json!({"name": "a", "type": "FTDI", "ftdi_id": "x"}), "are mandatory")]
    #[case::missing_type(json!({"name": "a", "channels": [1], "ftdi_id": "x"}), "are mandatory")]
    #[case::unknown_type(json!({"name": "a", "channels": [1], "type": "USB"}), "must be FTDI or SERIAL")]
    #[case::type_not_a_string(json!({"name": "a", "channels": [1], "type": 1}), "must be FTDI or SERIAL")]
    #[case::missing_ftdi_id(json!({"name": "a", "channels": [1], "type": "FTDI"}), "Missing configuration key ftdi_id")]
    #[case::missing_serial_port(json!({"name": "a", "channels": [1], "type": "SERIAL", "ftdi_id": "x"}), "Missing configuration key serial_port")]
    #[case::empty_name(json!({"name": "", "channels": [1], "type": "FTDI", "ftdi_id": "x"}), "key name")]
    #[case::name_not_a_string(json!({"name": 7, "channels": [1], "type": "FTDI", "ftdi_id": "x"}), "key name")]
    #[case::empty_channels(json!({"name": "a", "channels": [], "type": "FTDI", "ftdi_id": "x"}), "key channels")]
    #[case::negative_channel(json!({"name": "a", "channels": [-1], "type": "FTDI", "ftdi_id": "x"}), "key channels")]
    #[case::channel_not_a_number(json!({"name": "a", "channels": ["1"], "type": "FTDI", "ftdi_id": "x"}), "key channels")]
    #[case::ftdi_id_not_a_string(json!({"name": "a", "channels": [1], "type": "FTDI", "ftdi_id": 5}), "key ftdi_id")]
    fn test_invalid_device(#[case] device: Value, #[case] fragment: &str) {
        assert_invalid(json!({"devices": [device]}), fragment);
    }

    #[test]
    fn test_duplicate_names() {
        assert_invalid(
            json!({"devices": [ftdi_device("ess-1"), serial_device("ess-1")]}),
            "Duplicate device name ess-1",
        );
    }

    #[test]
    fn test_first_failure_wins() {
        let configuration = json!({"devices": [
            {"name": "a", "channels": [1], "type": "FTDI"},
            {"name": "b", "channels": [1], "type": "USB"}
        ]});
        assert_invalid(configuration, "Missing configuration key ftdi_id for FTDI device configuration 0");
    }
}
