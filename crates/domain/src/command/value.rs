//! Typed command values, decided once at parse time.

use serde::Serialize;
use serde_json::Value;

use crate::error::ParameterError;

/// The `value` payload of a [`Command`](super::Command).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum CommandValue {
    #[default]
    None,
    Number(f64),
    Text(String),
    Color(Color),
}

/// A color, either as hue/saturation or as red/green/blue components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Color {
    Hsv { hue: i64, saturation: i64 },
    Rgb { r: i64, g: i64, b: i64 },
}

/// Why a raw JSON value could not become a [`CommandValue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueShapeError {
    #[error("unsupported value type {0}")]
    UnsupportedType(&'static str),
    #[error("object is neither {{hue, saturation}} nor {{r, g, b}}")]
    UnrecognisedObject,
    #[error("color component {0} must be a whole number")]
    NonIntegerComponent(&'static str),
}

impl CommandValue {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "nothing",
            Self::Number(_) => "a number",
            Self::Text(_) => "text",
            Self::Color(_) => "a color",
        }
    }

    /// Interpret the value as a whole number.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongType`] for non-numbers and
    /// [`ParameterError::NotAnInteger`] for fractional or non-finite numbers.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_integer(&self, field: &'static str) -> Result<i64, ParameterError> {
        match self {
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(*n as i64),
            Self::Number(n) => Err(ParameterError::NotAnInteger { field, value: *n }),
            other => Err(ParameterError::WrongType {
                field,
                expected: "a number",
                found: other.kind(),
            }),
        }
    }

    /// Interpret the value as text.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongType`] for anything but text.
    pub fn as_text(&self, field: &'static str) -> Result<&str, ParameterError> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(ParameterError::WrongType {
                field,
                expected: "text",
                found: other.kind(),
            }),
        }
    }

    /// Interpret the value as a color.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::WrongType`] for anything but a color.
    pub fn as_color(&self, field: &'static str) -> Result<Color, ParameterError> {
        match self {
            Self::Color(color) => Ok(*color),
            other => Err(ParameterError::WrongType {
                field,
                expected: "a color",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<Value> for CommandValue {
    type Error = ValueShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::None),
            Value::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .ok_or(ValueShapeError::UnsupportedType("number")),
            Value::String(s) => Ok(Self::Text(s)),
            Value::Object(map) => Color::from_object(&map).map(Self::Color),
            Value::Bool(_) => Err(ValueShapeError::UnsupportedType("boolean")),
            Value::Array(_) => Err(ValueShapeError::UnsupportedType("array")),
        }
    }
}

impl Color {
    fn from_object(map: &serde_json::Map<String, Value>) -> Result<Self, ValueShapeError> {
        if map.contains_key("hue") && map.contains_key("saturation") {
            return Ok(Self::Hsv {
                hue: component(map, "hue")?,
                saturation: component(map, "saturation")?,
            });
        }
        if ["r", "g", "b"].iter().all(|k| map.contains_key(*k)) {
            return Ok(Self::Rgb {
                r: component(map, "r")?,
                g: component(map, "g")?,
                b: component(map, "b")?,
            });
        }
        Err(ValueShapeError::UnrecognisedObject)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn component(
    map: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<i64, ValueShapeError> {
    match map.get(key).and_then(Value::as_f64) {
        Some(n) if n.is_finite() && n.fract() == 0.0 => Ok(n as i64),
        _ => Err(ValueShapeError::NonIntegerComponent(key)),
    }
}
