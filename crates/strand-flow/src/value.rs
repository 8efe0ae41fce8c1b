//! Runtime values carried across connection lines.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value delivered to an input pin or bound to a variable.
///
/// `Date` is milliseconds since the unix epoch; `Stream` is an opaque
/// stream id owned by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  Array(Vec<Value>),
  Object(BTreeMap<String, Value>),
  Stream(u64),
  Date(i64),
}

impl Value {
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "boolean",
      Value::Int(_) => "integer",
      Value::Float(_) => "float",
      Value::String(_) => "string",
      Value::Array(_) => "array",
      Value::Object(_) => "object",
      Value::Stream(_) => "stream",
      Value::Date(_) => "date",
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  /// Convert to the JSON shape handed to the expression evaluator.
  ///
  /// Stream and Date degrade to plain integers; expressions see them as
  /// numbers, which is all the evaluation contract promises.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Int(n) => serde_json::Value::from(*n),
      Value::Float(f) => serde_json::Number::from_f64(*f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
      Value::Object(fields) => serde_json::Value::Object(
        fields
          .iter()
          .map(|(k, v)| (k.clone(), v.to_json()))
          .collect(),
      ),
      Value::Stream(id) => serde_json::Value::from(*id),
      Value::Date(ms) => serde_json::Value::from(*ms),
    }
  }

  /// Lift a JSON value produced by the expression evaluator.
  pub fn from_json(json: serde_json::Value) -> Value {
    match json {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(b),
      serde_json::Value::Number(n) => {
        if let Some(i) = n.as_i64() {
          Value::Int(i)
        } else {
          Value::Float(n.as_f64().unwrap_or(f64::NAN))
        }
      }
      serde_json::Value::String(s) => Value::String(s),
      serde_json::Value::Array(items) => {
        Value::Array(items.into_iter().map(Value::from_json).collect())
      }
      serde_json::Value::Object(fields) => Value::Object(
        fields
          .into_iter()
          .map(|(k, v)| (k, Value::from_json(v)))
          .collect(),
      ),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => write!(f, "null"),
      Value::Bool(b) => write!(f, "{}", b),
      Value::Int(n) => write!(f, "{}", n),
      Value::Float(v) => write!(f, "{}", v),
      Value::String(s) => write!(f, "{}", s),
      Value::Stream(id) => write!(f, "stream#{}", id),
      Value::Date(ms) => write!(f, "date({})", ms),
      other => write!(f, "{}", other.to_json()),
    }
  }
}
