//! Command — the normalized unit handed over by any producer.
//!
//! A producer (speech pipeline, scheduler, keyboard trigger, …) emits
//! `{"action": "light.on", "device": "lamp1", "value": …}`. The command is
//! immutable once constructed; the value shape is fixed at parse time.

mod action;
mod value;

pub use action::{Action, Domain};
pub use value::{Color, CommandValue, ValueShapeError};

use serde::Deserialize;

use crate::id::DeviceId;

/// A validated-shape command, not yet checked against the security gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    action: String,
    device: DeviceId,
    value: CommandValue,
}

/// Why producer output could not become a [`Command`].
#[derive(Debug, thiserror::Error)]
pub enum CommandParseError {
    #[error("not a valid command")]
    Malformed(#[source] Option<serde_json::Error>),
    #[error("command action is empty")]
    EmptyAction,
    #[error("unsupported command value")]
    Value(#[from] ValueShapeError),
}

#[derive(Deserialize)]
struct RawCommand {
    #[serde(default)]
    action: String,
    #[serde(default)]
    device: String,
    #[serde(default)]
    value: serde_json::Value,
}

impl Command {
    /// Build a command directly.
    #[must_use]
    pub fn new(action: impl Into<String>, device: impl Into<DeviceId>, value: CommandValue) -> Self {
        Self {
            action: action.into(),
            device: device.into(),
            value,
        }
    }

    /// Parse producer output: a JSON object, or the first `{…}` span
    /// embedded in surrounding text.
    ///
    /// # Errors
    ///
    /// Returns [`CommandParseError::Malformed`] when no JSON object can be
    /// read, [`CommandParseError::EmptyAction`] when `action` is missing or
    /// blank, and [`CommandParseError::Value`] when `value` has no supported
    /// shape.
    pub fn parse(text: &str) -> Result<Self, CommandParseError> {
        let text = text.trim();
        let raw = match serde_json::from_str::<RawCommand>(text) {
            Ok(raw) => raw,
            Err(err) => {
                let start = text.find('{');
                let end = text.rfind('}');
                match (start, end) {
                    (Some(start), Some(end)) if end > start => {
                        serde_json::from_str::<RawCommand>(&text[start..=end])
                            .map_err(|e| CommandParseError::Malformed(Some(e)))?
                    }
                    _ => return Err(CommandParseError::Malformed(Some(err))),
                }
            }
        };
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawCommand) -> Result<Self, CommandParseError> {
        let action = raw.action.trim();
        if action.is_empty() {
            return Err(CommandParseError::EmptyAction);
        }
        Ok(Self {
            action: action.to_string(),
            device: DeviceId::new(raw.device),
            value: CommandValue::try_from(raw.value)?,
        })
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    #[must_use]
    pub fn value(&self) -> &CommandValue {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_plain_json_command() {
        let cmd = Command::parse(r#"{"action":"light.on","device":"phong_khach"}"#).unwrap();
        assert_eq!(cmd.action(), "light.on");
        assert_eq!(cmd.device().as_str(), "phong_khach");
        assert_eq!(cmd.value(), &CommandValue::None);
    }

    #[test]
    fn should_parse_command_embedded_in_text() {
        let cmd = Command::parse(
            r#"Sure, turning it on. {"action":"ac.set_temp","device":"ac1","value":26} Done."#,
        )
        .unwrap();
        assert_eq!(cmd.action(), "ac.set_temp");
        assert_eq!(cmd.value(), &CommandValue::Number(26.0));
    }

    #[test]
    fn should_reject_truncated_json() {
        assert!(matches!(
            Command::parse(r#"{"action":"light.on""#),
            Err(CommandParseError::Malformed(_))
        ));
    }

    #[test]
    fn should_reject_plain_text() {
        assert!(matches!(
            Command::parse("turn on the light please"),
            Err(CommandParseError::Malformed(_))
        ));
    }

    #[test]
    fn should_reject_empty_action() {
        assert!(matches!(
            Command::parse(r#"{"action":"  ","device":"lamp1"}"#),
            Err(CommandParseError::EmptyAction)
        ));
    }

    #[test]
    fn should_reject_missing_action() {
        assert!(matches!(
            Command::parse(r#"{"device":"lamp1"}"#),
            Err(CommandParseError::EmptyAction)
        ));
    }

    #[test]
    fn should_reject_boolean_value() {
        assert!(matches!(
            Command::parse(r#"{"action":"light.on","device":"lamp1","value":true}"#),
            Err(CommandParseError::Value(_))
        ));
    }

    #[test]
    fn should_parse_color_value() {
        let cmd = Command::parse(
            r#"{"action":"light.color","device":"lamp1","value":{"hue":30,"saturation":90}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd.value(),
            &CommandValue::Color(Color::Hsv {
                hue: 30,
                saturation: 90
            })
        );
    }
}
