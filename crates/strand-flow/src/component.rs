//! Component definitions as authored in the editor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A property value: either a literal or an expression re-evaluated on
/// every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
  Literal(Value),
  Expression(String),
}

/// One node of a flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
  pub id: String,
  /// Selects the registered descriptor (pin schema + execute behavior).
  pub kind: String,
  #[serde(default)]
  pub properties: HashMap<String, PropertyValue>,
  /// Authored initial breakpoint state, seeded into the runtime's
  /// breakpoint table when a debug session starts.
  #[serde(default)]
  pub breakpoint: bool,
}

impl Component {
  pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      kind: kind.into(),
      properties: HashMap::new(),
      breakpoint: false,
    }
  }

  pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
    self.properties.insert(name.into(), value);
    self
  }

  pub fn with_breakpoint(mut self) -> Self {
    self.breakpoint = true;
    self
  }

  pub fn property(&self, name: &str) -> Option<&PropertyValue> {
    self.properties.get(name)
  }
}
