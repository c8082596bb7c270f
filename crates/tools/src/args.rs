//! Argument decoding shared by every store operation.
//!
//! Models are loose with JSON types: integers arrive as `2.0` or `"2"`,
//! booleans as `"true"`. Each operation declares a typed argument struct
//! and decodes into it here; anything that still doesn't fit becomes
//! [`ToolError::InvalidArguments`].

use cartwright_core::error::ToolError;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;

/// Decode a tool's JSON arguments into its typed argument struct.
pub fn parse_args<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> Result<T, ToolError> {
    // A bare `null` means "no arguments".
    let arguments = if arguments.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::InvalidArguments(format!("{tool}: {e}")))
}

/// The user id as the model sent it, if it names a real session.
///
/// The frontend serializes a missing session as `"null"` or `"undefined"`.
pub fn session_user_id(raw: Option<&str>) -> Option<&str> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") | Some("undefined") => None,
        Some(id) => Some(id),
    }
}

/// Integer that also accepts whole floats and numeric strings.
pub fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        Raw::Float(f) => Err(de::Error::custom(format!("expected a whole number, got {f}"))),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a whole number, got '{s}'"))),
    }
}

/// Boolean that also accepts `"true"` / `"false"` strings.
pub fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, got '{other}'"))),
        },
    }
}

/// Optional string that treats JSON `null` and non-string scalars leniently.
pub fn lenient_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("expected a string, got {other}"))),
    }
}
