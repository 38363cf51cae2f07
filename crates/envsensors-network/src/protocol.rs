//! Line protocol between a client and the agent.
//!
//! Inbound, one JSON object per line:
//!
//! ```text
//! {"command": "configure", "parameters": {"configuration": {"devices": [...]}}}
//! {"command": "start"}
//! ```
//!
//! Outbound, one JSON object per line, either a reply or a sample:
//!
//! ```text
//! {"response": "OK"}
//! {"telemetry": {"name": "ess-1", "timestamp": "...", "values": [21.1234, null]}}
//! ```

use envsensors_core::{Command, Message};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A command line as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundCommand {
    /// Command name.
    pub command: String,

    /// Command parameters, empty when omitted.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Parse one inbound line into a command and its parameters.
///
/// # Errors
///
/// Returns an error if the line is not a command object or names an unknown
/// command.
///
/// # Examples
///
/// ```
/// use envsensors_core::Command;
/// use envsensors_network::parse_command;
///
/// let (command, parameters) = parse_command(r#"{"command": "start"}"#).unwrap();
/// assert_eq!(command, Command::Start);
/// assert!(parameters.is_empty());
///
/// assert!(parse_command(r#"{"command": "reboot"}"#).is_err());
/// ```
pub fn parse_command(line: &str) -> envsensors_core::Result<(Command, Map<String, Value>)> {
    let inbound: InboundCommand = serde_json::from_str(line)?;
    let command = inbound.command.parse::<Command>()?;
    Ok((command, inbound.parameters))
}

/// Encode an outbound message as one line, without terminator.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_message(message: &Message) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsensors_core::{Error, ResponseCode, Telemetry};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(r#"{"command": "configure", "parameters": {"configuration": {}}}"#, Command::Configure)]
    #[case(r#"{"command": "start"}"#, Command::Start)]
    #[case(r#"{"command": "stop", "parameters": {}}"#, Command::Stop)]
    #[case(r#"{"command": "disconnect"}"#, Command::Disconnect)]
    #[case(r#"{"command": "exit"}"#, Command::Exit)]
    fn test_parse_command(#[case] line: &str, #[case] expected: Command) {
        let (command, _) = parse_command(line).unwrap();
        assert_eq!(command, expected);
    }

    #[test]
    fn test_parse_command_keeps_parameters() {
        let (_, parameters) = parse_command(
            r#"{"command": "configure", "parameters": {"configuration": {"devices": []}}}"#,
        )
        .unwrap();
        assert_eq!(parameters["configuration"], json!({"devices": []}));
    }

    #[test]
    fn test_parse_unknown_command() {
        let result = parse_command(r#"{"command": "reboot"}"#);
        assert!(matches!(result, Err(Error::UnknownCommand(name)) if name == "reboot"));
    }

    #[rstest]
    #[case("not json")]
    #[case("[1, 2]")]
    #[case(r#"{"parameters": {}}"#)]
    #[case(r#"{"command": 1}"#)]
    fn test_parse_malformed(#[case] line: &str) {
        assert!(matches!(parse_command(line), Err(Error::Json(_))));
    }

    #[test]
    fn test_encode_response() {
        let line = encode_message(&Message::Response(ResponseCode::AlreadyStarted)).unwrap();
        assert_eq!(line, r#"{"response":"ALREADY_STARTED"}"#);
    }

    #[test]
    fn test_encode_telemetry() {
        let line = encode_message(&Message::Telemetry(Telemetry::new(
            "ess-1",
            vec![Some(21.5), None],
        )))
        .unwrap();

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["telemetry"]["name"], "ess-1");
        assert_eq!(value["telemetry"]["values"], json!([21.5, null]));
        assert!(value["telemetry"]["timestamp"].is_string());
        assert!(!line.contains('\n'));
    }
}
