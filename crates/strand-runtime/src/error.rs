//! Runtime error types.

use thiserror::Error;
use uuid::Uuid;

use strand_flow::{ComponentError, GraphError};

/// Errors that can occur while a flow is running.
///
/// A `FlowError` raised by a task is caught by the scheduler, attached to
/// the owning flow state, bubbled to the root, and stops the runtime with
/// an error; it never escapes `pump`.
#[derive(Debug, Error)]
pub enum FlowError {
  /// The project failed graph validation.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// An expression failed to evaluate.
  #[error("expression '{expression}' failed in component '{component}': {message}")]
  Expression {
    component: String,
    expression: String,
    message: String,
  },

  /// A required property is missing or mistyped.
  #[error("property '{name}' of component '{component}': {message}")]
  Property {
    component: String,
    name: String,
    message: String,
  },

  /// A component's own execute logic failed.
  #[error("component '{component}' failed: {message}")]
  ComponentExecution { component: String, message: String },

  #[error("flow not found: {0}")]
  FlowNotFound(String),

  #[error("flow state not found: {0}")]
  StateNotFound(Uuid),
}

impl FlowError {
  /// Lift a behavior-level error, keeping its taxonomy.
  pub(crate) fn from_component(component: &str, err: ComponentError) -> Self {
    match err {
      ComponentError::Expression {
        expression,
        message,
      } => FlowError::Expression {
        component: component.to_string(),
        expression,
        message,
      },
      ComponentError::Property { name, message } => FlowError::Property {
        component: component.to_string(),
        name,
        message,
      },
      ComponentError::Failed(message) => FlowError::ComponentExecution {
        component: component.to_string(),
        message,
      },
    }
  }
}
