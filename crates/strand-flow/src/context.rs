//! The seam between component behaviors and the runtime.
//!
//! A descriptor's `execute` receives a [`ComponentContext`] owned by the
//! scheduler. All effects (propagation, variable assignment, spawning
//! nested flow states) go through it; a behavior never touches the queue
//! directly.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use strand_bridge::{NativeEngine, NativeState, StateHandle};

use crate::pin::PinType;
use crate::value::Value;

/// Failure raised by a component behavior.
///
/// The scheduler maps these onto its own error taxonomy: `Expression` and
/// `Property` keep their identity, everything else is a component
/// execution failure.
#[derive(Debug, Clone, Error)]
pub enum ComponentError {
  #[error("expression '{expression}' failed: {message}")]
  Expression { expression: String, message: String },

  #[error("property '{name}': {message}")]
  Property { name: String, message: String },

  #[error("{0}")]
  Failed(String),
}

impl ComponentError {
  pub fn missing_property(name: &str) -> Self {
    ComponentError::Property {
      name: name.to_string(),
      message: "required property is missing".to_string(),
    }
  }

  pub fn mistyped_property(name: &str, expected: &str, found: &Value) -> Self {
    ComponentError::Property {
      name: name.to_string(),
      message: format!("expected {}, found {}", expected, found.type_name()),
    }
  }
}

/// What a behavior did with its invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
  Completed,
  /// The component registered long-running work and will re-enter the
  /// queue through its [`AsyncHandle`].
  Suspended,
}

/// Outcome delivered by a suspended component when its work finishes.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
  /// Fire the sequence output.
  Sequence,
  /// Propagate a data value, then fire the sequence output.
  Output { name: String, value: Value },
  /// The work failed; the scheduler treats this as an execution error.
  Error { message: String },
}

/// A finished unit of asynchronous work, re-entering the queue.
#[derive(Debug, Clone)]
pub struct Completion {
  pub flow_state: Uuid,
  pub component: String,
  pub outcome: CompletionOutcome,
}

/// Completes one suspended invocation.
///
/// The sequence output fires strictly after the completion has been
/// processed by the scheduler, never before.
#[derive(Debug, Clone)]
pub struct AsyncHandle {
  sender: UnboundedSender<Completion>,
  flow_state: Uuid,
  component: String,
}

impl AsyncHandle {
  pub fn new(
    sender: UnboundedSender<Completion>,
    flow_state: Uuid,
    component: impl Into<String>,
  ) -> Self {
    Self {
      sender,
      flow_state,
      component: component.into(),
    }
  }

  fn send(self, outcome: CompletionOutcome) {
    // The runtime may already be gone; a dropped completion is the
    // cancelled case, not an error.
    let _ = self.sender.send(Completion {
      flow_state: self.flow_state,
      component: self.component,
      outcome,
    });
  }

  pub fn complete(self) {
    self.send(CompletionOutcome::Sequence);
  }

  pub fn complete_with(self, output: impl Into<String>, value: Value) {
    self.send(CompletionOutcome::Output {
      name: output.into(),
      value,
    });
  }

  pub fn fail(self, message: impl Into<String>) {
    self.send(CompletionOutcome::Error {
      message: message.into(),
    });
  }
}

/// Execution context handed to a component behavior.
pub trait ComponentContext {
  fn component_id(&self) -> &str;

  /// Value delivered to a data input during the current invocation
  /// generation (or left over from an earlier one).
  fn input(&self, name: &str) -> Option<Value>;

  /// Evaluate a property: literals pass through, expressions are
  /// evaluated against the current flow state.
  fn eval_property(&mut self, name: &str) -> Result<Value, ComponentError>;

  /// [`ComponentContext::eval_property`] plus coercion to a pin type.
  fn eval_property_with_type(&mut self, name: &str, ty: PinType)
  -> Result<Value, ComponentError>;

  /// Variable lookup through the flow-state scope chain and globals.
  fn get_variable(&self, name: &str) -> Option<Value>;

  fn set_variable(&mut self, name: &str, value: Value);

  /// Resolve a settable expression (variable or `outputs.<name>`) and
  /// commit the value.
  fn assign(&mut self, assignable: &str, value: Value) -> Result<(), ComponentError>;

  /// Propagate a value through one of this component's outputs.
  fn propagate(&mut self, output: &str, value: Value);

  /// Propagate through the sequence output with no data payload.
  fn propagate_seqout(&mut self);

  /// Spawn a nested flow state for the given flow. `index` binds the
  /// `index` local for per-item repeater instances.
  fn spawn_flow(&mut self, flow_id: &str, index: Option<i64>) -> Result<(), ComponentError>;

  /// Mark this invocation suspended and obtain the completion handle.
  fn async_handle(&mut self) -> AsyncHandle;

  /// The attached compiled backend, if any.
  fn native_engine(&mut self) -> Option<&mut dyn NativeEngine>;

  /// Register interpreter-side state with the compiled backend's handle
  /// table, tied to the lifetime of the owning flow state.
  fn register_native_state(
    &mut self,
    object: Arc<dyn NativeState>,
  ) -> Result<StateHandle, ComponentError>;

  /// Whether this component already holds native state in the owning
  /// flow state.
  fn has_native_state(&self) -> bool;

  /// Emit a runtime log line attributed to this component.
  fn log(&mut self, message: &str);
}
