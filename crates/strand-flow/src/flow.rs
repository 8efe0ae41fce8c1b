//! Flows, connection lines, and the project container.

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::error::GraphError;
use crate::value::Value;

/// A directed wire from one component's output pin to another component's
/// input pin, within a single flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionLine {
  pub source: String,
  pub output: String,
  pub target: String,
  pub input: String,
}

impl ConnectionLine {
  pub fn new(
    source: impl Into<String>,
    output: impl Into<String>,
    target: impl Into<String>,
    input: impl Into<String>,
  ) -> Self {
    Self {
      source: source.into(),
      output: output.into(),
      target: target.into(),
      input: input.into(),
    }
  }
}

/// A variable declaration with its initial value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
  pub name: String,
  pub value: Value,
  /// Persistent globals survive across runs via the runtime settings file.
  #[serde(default)]
  pub persistent: bool,
}

/// A static flow graph. Immutable once a runtime has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
  pub id: String,
  pub components: Vec<Component>,
  #[serde(default)]
  pub connection_lines: Vec<ConnectionLine>,
  #[serde(default)]
  pub local_variables: Vec<VariableDef>,
}

impl Flow {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      components: Vec::new(),
      connection_lines: Vec::new(),
      local_variables: Vec::new(),
    }
  }

  pub fn get_component(&self, id: &str) -> Option<&Component> {
    self.components.iter().find(|c| c.id == id)
  }

  /// Lines leaving `component` through `output`.
  pub fn lines_from<'a>(
    &'a self,
    component: &'a str,
    output: &'a str,
  ) -> impl Iterator<Item = &'a ConnectionLine> {
    self
      .connection_lines
      .iter()
      .filter(move |line| line.source == component && line.output == output)
  }

  /// Lines entering `component`, any input.
  pub fn lines_into<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a ConnectionLine> {
    self
      .connection_lines
      .iter()
      .filter(move |line| line.target == component)
  }

  /// Components with no incoming lines; these seed the queue when a
  /// flow state starts.
  pub fn entry_components(&self) -> impl Iterator<Item = &Component> {
    self
      .components
      .iter()
      .filter(|c| !self.connection_lines.iter().any(|line| line.target == c.id))
  }
}

/// The unit a runtime executes: flows plus project-wide globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowProject {
  pub name: String,
  pub flows: Vec<Flow>,
  /// Flows started when the runtime starts, in order.
  pub roots: Vec<String>,
  #[serde(default)]
  pub globals: Vec<VariableDef>,
}

impl FlowProject {
  pub fn from_json(json: &str) -> Result<Self, GraphError> {
    serde_json::from_str(json).map_err(GraphError::Parse)
  }

  pub fn get_flow(&self, id: &str) -> Option<&Flow> {
    self.flows.iter().find(|f| f.id == id)
  }
}
