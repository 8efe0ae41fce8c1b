//! Graph model errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("failed to parse project JSON: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("flow not found: {0}")]
  FlowNotFound(String),

  #[error("duplicate flow id: {0}")]
  DuplicateFlow(String),

  #[error("duplicate component id '{component}' in flow '{flow}'")]
  DuplicateComponent { flow: String, component: String },

  #[error("component kind already registered: {0}")]
  DuplicateKind(String),

  #[error("unknown component kind '{kind}' for component '{component}' in flow '{flow}'")]
  UnknownKind {
    flow: String,
    component: String,
    kind: String,
  },

  #[error("connection line in flow '{flow}' references unknown component: {component}")]
  LineComponentNotFound { flow: String, component: String },

  #[error("component '{component}' in flow '{flow}' has no pin named '{pin}'")]
  PinNotFound {
    flow: String,
    component: String,
    pin: String,
  },

  #[error(
    "incompatible pin types in flow '{flow}': {source_component}.{output} ({source_type}) -> {target_component}.{input} ({target_type})"
  )]
  IncompatiblePins {
    flow: String,
    source_component: String,
    output: String,
    source_type: String,
    target_component: String,
    input: String,
    target_type: String,
  },

  #[error("sequence pin wired to a data pin in flow '{flow}': {source_component}.{output} -> {target}.{input}")]
  SequenceToData {
    flow: String,
    source_component: String,
    output: String,
    target: String,
    input: String,
  },

  #[error("data-pin cycle detected in flow '{0}'")]
  DataCycle(String),

  #[error("root flow not found: {0}")]
  RootNotFound(String),
}
