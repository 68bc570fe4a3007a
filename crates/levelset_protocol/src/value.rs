//! Typed setting values.
//!
//! Every setting carries one of four kinds. The set is closed: the resolver,
//! validator, differ and hasher all match exhaustively on `ConfigValue`, so a
//! new kind cannot be added without the compiler pointing at every site that
//! must handle it.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueKind {
    Boolean,
    String,
    Number,
    Json,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Json => "JSON",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BOOLEAN" => Some(Self::Boolean),
            "STRING" => Some(Self::String),
            "NUMBER" => Some(Self::Number),
            "JSON" => Some(Self::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw payload that cannot be read as its declared kind.
#[derive(Debug, Error)]
#[error("Cannot read value as {kind}: {detail}")]
pub struct ValueError {
    pub kind: ValueKind,
    pub detail: String,
}

/// A type-coerced setting value.
///
/// NUMBER payloads are exact decimals, never binary floats: `0.1` stays
/// `0.1`, and `10` compares equal to `10.00`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Boolean(bool),
    String(String),
    Number(Decimal),
    Json(Value),
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::String(_) => ValueKind::String,
            Self::Number(_) => ValueKind::Number,
            Self::Json(_) => ValueKind::Json,
        }
    }

    /// Coerce a raw JSON payload into a typed value.
    ///
    /// Editors submit BOOLEAN and NUMBER payloads either natively or as
    /// strings; both spellings are accepted. JSON payloads must be an object
    /// or an array (a bare scalar tagged JSON is a contract violation).
    pub fn coerce(kind: ValueKind, raw: &Value) -> Result<Self, ValueError> {
        match kind {
            ValueKind::Boolean => match raw {
                Value::Bool(b) => Ok(Self::Boolean(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Self::Boolean(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Self::Boolean(false)),
                other => Err(coercion(kind, format!("expected true/false, got {other}"))),
            },
            ValueKind::String => match raw {
                Value::String(s) => Ok(Self::String(s.clone())),
                other => Err(coercion(kind, format!("expected a string, got {other}"))),
            },
            ValueKind::Number => {
                let text = match raw {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.trim().to_string(),
                    other => {
                        return Err(coercion(kind, format!("expected a number, got {other}")))
                    }
                };
                Decimal::from_str(&text)
                    .map(Self::Number)
                    .map_err(|e| coercion(kind, format!("'{text}': {e}")))
            }
            ValueKind::Json => {
                let tree = match raw {
                    Value::Object(_) | Value::Array(_) => raw.clone(),
                    Value::String(s) => serde_json::from_str::<Value>(s)
                        .map_err(|e| coercion(kind, format!("invalid JSON: {e}")))?,
                    other => {
                        return Err(coercion(
                            kind,
                            format!("expected an object or array, got {other}"),
                        ))
                    }
                };
                match tree {
                    Value::Object(_) | Value::Array(_) => Ok(Self::Json(tree)),
                    other => Err(coercion(
                        kind,
                        format!("expected an object or array, got {other}"),
                    )),
                }
            }
        }
    }

    /// Encode the payload for snapshots and client responses.
    ///
    /// NUMBER encodes as a string to preserve the exact decimal (the `type`
    /// tag tells clients how to read it back); the declared scale survives
    /// the round trip, so `10.00` stays `10.00`.
    pub fn payload_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::Number(d) => Value::String(d.to_string()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Semantic equality per kind: booleans and strings by value, numbers
    /// numerically (scale-insensitive), JSON by structural tree equality.
    pub fn semantically_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            _ => false,
        }
    }
}

fn coercion(kind: ValueKind, detail: String) -> ValueError {
    ValueError { kind, detail }
}
