//! Flow states and per-component invocation state.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use strand_bridge::StateHandle;
use strand_flow::{Flow, Value};

/// Per-component runtime state within one flow state.
#[derive(Debug, Default)]
pub struct ComponentState {
  /// Last value delivered to each input. Survives across invocations so
  /// a re-triggered component sees its latest data.
  input_values: HashMap<String, Value>,
  /// Inputs delivered during the current invocation generation.
  fresh: HashSet<String>,
  /// An unconsumed sequence signal is pending.
  seq_pending: bool,
  /// Bumped when an invocation is dispatched.
  generation: u64,
  /// An execute task for the current generation is already queued.
  execute_enqueued: bool,
  /// The component registered long-running work and has not completed.
  suspended: bool,
}

impl ComponentState {
  pub fn input(&self, name: &str) -> Option<&Value> {
    self.input_values.get(name)
  }

  pub fn inputs(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.input_values.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn is_suspended(&self) -> bool {
    self.suspended
  }

  pub fn set_suspended(&mut self, suspended: bool) {
    self.suspended = suspended;
  }

  pub fn record_input(&mut self, name: &str, value: Value, is_sequence: bool) {
    if is_sequence {
      self.seq_pending = true;
    } else {
      self.input_values.insert(name.to_string(), value);
      self.fresh.insert(name.to_string());
    }
  }

  /// Whether the component is ready to execute, given which of its inputs
  /// are wired.
  ///
  /// With connected sequence inputs: a sequence signal is pending and every
  /// connected mandatory data input has been delivered at least once. Without:
  /// something fresh arrived and every connected mandatory data input is
  /// fresh in the current generation.
  pub fn ready(&self, has_sequence_inputs: bool, mandatory: &[String]) -> bool {
    if self.execute_enqueued {
      return false;
    }
    if has_sequence_inputs {
      self.seq_pending
        && mandatory
          .iter()
          .all(|name| self.input_values.contains_key(name))
    } else {
      !self.fresh.is_empty() && mandatory.iter().all(|name| self.fresh.contains(name))
    }
  }

  pub fn mark_enqueued(&mut self) {
    self.execute_enqueued = true;
  }

  /// Consume the pending inputs and open the next invocation generation.
  pub fn begin_invocation(&mut self) {
    self.fresh.clear();
    self.seq_pending = false;
    self.execute_enqueued = false;
    self.generation = self.generation.wrapping_add(1);
  }
}

/// One running instance of a flow, part of the parent/child tree.
#[derive(Debug)]
pub struct FlowState {
  pub id: Uuid,
  pub flow_id: String,
  pub parent: Option<Uuid>,
  pub children: Vec<Uuid>,
  pub error: Option<String>,
  pub is_finished: bool,
  /// Queued tasks currently owned by this flow state.
  pub(crate) active_tasks: usize,
  variables: HashMap<String, Value>,
  component_states: HashMap<String, ComponentState>,
  native_handles: HashMap<String, Vec<StateHandle>>,
}

impl FlowState {
  pub fn new(flow: &Flow, parent: Option<Uuid>) -> Self {
    let variables = flow
      .local_variables
      .iter()
      .map(|def| (def.name.clone(), def.value.clone()))
      .collect();
    Self {
      id: Uuid::new_v4(),
      flow_id: flow.id.clone(),
      parent,
      children: Vec::new(),
      error: None,
      is_finished: false,
      active_tasks: 0,
      variables,
      component_states: HashMap::new(),
      native_handles: HashMap::new(),
    }
  }

  pub fn local(&self, name: &str) -> Option<&Value> {
    self.variables.get(name)
  }

  pub fn has_local(&self, name: &str) -> bool {
    self.variables.contains_key(name)
  }

  pub fn set_local(&mut self, name: &str, value: Value) {
    self.variables.insert(name.to_string(), value);
  }

  pub fn locals(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.variables.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn component_state(&self, component: &str) -> Option<&ComponentState> {
    self.component_states.get(component)
  }

  pub fn component_state_mut(&mut self, component: &str) -> &mut ComponentState {
    self.component_states.entry(component.to_string()).or_default()
  }

  pub fn component_input(&self, component: &str, input: &str) -> Option<Value> {
    self.component_states.get(component)?.input(input).cloned()
  }

  pub fn is_component_suspended(&self, component: &str) -> bool {
    self
      .component_states
      .get(component)
      .is_some_and(ComponentState::is_suspended)
  }

  pub fn has_suspended(&self) -> bool {
    self.component_states.values().any(ComponentState::is_suspended)
  }

  pub(crate) fn suspended_components(&self) -> Vec<String> {
    self
      .component_states
      .iter()
      .filter(|(_, state)| state.is_suspended())
      .map(|(id, _)| id.clone())
      .collect()
  }

  pub(crate) fn push_native_handle(&mut self, component: &str, handle: StateHandle) {
    self
      .native_handles
      .entry(component.to_string())
      .or_default()
      .push(handle);
  }

  pub fn has_native_state(&self, component: &str) -> bool {
    self
      .native_handles
      .get(component)
      .is_some_and(|handles| !handles.is_empty())
  }

  /// Drain every native handle registered under this flow state.
  pub(crate) fn take_native_handles(&mut self) -> Vec<StateHandle> {
    self
      .native_handles
      .drain()
      .flat_map(|(_, handles)| handles)
      .collect()
  }
}
