//! The flow runtime: cooperative scheduler, run-state machine, flow-state
//! tree, and the value-propagation protocol.
//!
//! One `Runtime` owns one queue, one breakpoint table, and one handle
//! table; nothing here is shared across runtime instances. `pump()` is
//! driven by the host on a periodic tick and is never re-entrant.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use strand_bridge::{
  BridgeError, BridgeStateStore, EngineInstanceId, NativeEngine, NativeState, StateHandle,
};
use strand_flow::{
  AsyncHandle, ComponentContext, ComponentDescriptor, ComponentError, ComponentRegistry,
  Completion, CompletionOutcome, Execution, Flow, FlowProject, PinType, PropertyValue, SEQ_IN,
  SEQ_OUT, Value, validate_project,
};

use crate::error::FlowError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::expression::{ExpressionEvaluator, JinjaEvaluator, coerce_value};
use crate::queue::{LineRef, QueueTask, TaskSnapshot};
use crate::settings::RuntimeSettings;
use crate::state::FlowState;

/// Why a runtime stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
  Success,
  Error,
}

/// The run-state machine.
///
/// `Idle → Running` on start, `Running ⇄ Paused` via pause/resume, any
/// state `→ Stopped` via stop or an unhandled error. Invalid transitions
/// are logged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Idle,
  Running,
  Paused,
  Stopped(StopReason),
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunState::Idle => write!(f, "idle"),
      RunState::Running => write!(f, "running"),
      RunState::Paused => write!(f, "paused"),
      RunState::Stopped(StopReason::Success) => write!(f, "stopped"),
      RunState::Stopped(StopReason::Error) => write!(f, "stopped (error)"),
    }
  }
}

/// Single-step granularity while paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  /// Stop at the first task of a freshly spawned child flow state.
  Into,
  /// Treat a child flow state's execution as atomic.
  Over,
  /// Run until the current flow state finishes.
  Out,
}

/// One breakpoint table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
  pub enabled: bool,
}

struct NativeBridge {
  engine: Box<dyn NativeEngine>,
  instance: EngineInstanceId,
}

/// A flow runtime instance.
///
/// Generic over the notifier so hosts choose how to observe execution;
/// `Runtime::new` gives the no-op default.
pub struct Runtime<N: ExecutionNotifier = NoopNotifier> {
  project: Arc<FlowProject>,
  registry: Arc<ComponentRegistry>,
  notifier: N,
  evaluator: Box<dyn ExpressionEvaluator>,
  settings: RuntimeSettings,

  state: RunState,
  debug_active: bool,
  run_id: String,
  error: Option<String>,

  queue: VecDeque<QueueTask>,
  next_task_id: u64,
  flow_states: HashMap<Uuid, FlowState>,
  root_states: Vec<Uuid>,
  globals: HashMap<String, Value>,

  breakpoints: HashMap<String, Breakpoint>,
  /// Task retained across a breakpoint pause so resume re-dispatches it
  /// unchanged.
  last_breakpoint_task: Option<u64>,

  completions_tx: UnboundedSender<Completion>,
  completions_rx: UnboundedReceiver<Completion>,
  suspended_count: usize,

  bridge: Option<NativeBridge>,
  next_engine_instance: u32,
  store: BridgeStateStore,
}

impl Runtime<NoopNotifier> {
  /// Create a runtime with no-op notifications.
  pub fn new(project: FlowProject, registry: Arc<ComponentRegistry>) -> Result<Self, FlowError> {
    Self::with_notifier(project, registry, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Runtime<N> {
  /// Create a runtime with a custom notifier. Validates the project.
  pub fn with_notifier(
    project: FlowProject,
    registry: Arc<ComponentRegistry>,
    notifier: N,
  ) -> Result<Self, FlowError> {
    validate_project(&project, &registry)?;
    let globals = project
      .globals
      .iter()
      .map(|def| (def.name.clone(), def.value.clone()))
      .collect();
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    Ok(Self {
      project: Arc::new(project),
      registry,
      notifier,
      evaluator: Box::new(JinjaEvaluator::new()),
      settings: RuntimeSettings::in_memory(),
      state: RunState::Idle,
      debug_active: false,
      run_id: String::new(),
      error: None,
      queue: VecDeque::new(),
      next_task_id: 0,
      flow_states: HashMap::new(),
      root_states: Vec::new(),
      globals,
      breakpoints: HashMap::new(),
      last_breakpoint_task: None,
      completions_tx,
      completions_rx,
      suspended_count: 0,
      bridge: None,
      next_engine_instance: 0,
      store: BridgeStateStore::new(),
    })
  }

  pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
    self.settings = settings;
    self
  }

  pub fn with_evaluator(mut self, evaluator: Box<dyn ExpressionEvaluator>) -> Self {
    self.evaluator = evaluator;
    self
  }

  // ---------------------------------------------------------------- state

  pub fn state(&self) -> RunState {
    self.state
  }

  pub fn is_paused(&self) -> bool {
    self.state == RunState::Paused
  }

  pub fn is_stopped(&self) -> bool {
    matches!(self.state, RunState::Stopped(_))
  }

  pub fn is_debug_active(&self) -> bool {
    self.debug_active
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn project(&self) -> &FlowProject {
    &self.project
  }

  fn set_state(&mut self, state: RunState) {
    if self.state == state {
      return;
    }
    debug!(from = %self.state, to = %state, "state transition");
    self.state = state;
  }

  // ------------------------------------------------------------ lifecycle

  /// Start the runtime: restore persisted globals, seed authored
  /// breakpoints when a debugger is attached, create the root flow
  /// states, and begin running.
  pub fn start(&mut self, debug_active: bool) -> Result<(), FlowError> {
    if self.state != RunState::Idle {
      warn!(state = %self.state, "start ignored");
      return Ok(());
    }

    self.debug_active = debug_active;
    self.run_id = Uuid::new_v4().to_string();

    for (name, value) in self.settings.persistent_variables() {
      let declared = self
        .project
        .globals
        .iter()
        .any(|def| def.persistent && def.name == name);
      if declared {
        self.globals.insert(name, value);
      }
    }

    if debug_active {
      let project = Arc::clone(&self.project);
      for flow in &project.flows {
        for component in &flow.components {
          if component.breakpoint {
            self
              .breakpoints
              .insert(component.id.clone(), Breakpoint { enabled: true });
          }
        }
      }
    }

    let roots = self.project.roots.clone();
    for flow_id in roots {
      self.create_flow_state(&flow_id, None, None)?;
    }

    self.set_state(RunState::Running);
    info!(run_id = %self.run_id, debug_active, "runtime started");
    self.notifier.notify(ExecutionEvent::RuntimeStarted {
      run_id: self.run_id.clone(),
      debug_active,
    });
    Ok(())
  }

  /// Stop the runtime: tear down the flow-state tree depth-first, discard
  /// all pending queue entries, flush the handle table, and persist
  /// settings.
  pub fn stop(&mut self, notify_user: bool) {
    if self.is_stopped() {
      return;
    }

    let roots = self.root_states.clone();
    for root in roots {
      self.destroy_flow_state(root);
    }
    self.queue.clear();

    if let Some(bridge) = &self.bridge {
      self.store.release_all_states(bridge.instance);
    }

    self.save_settings();

    let reason = if self.error.is_some() {
      StopReason::Error
    } else {
      StopReason::Success
    };
    self.set_state(RunState::Stopped(reason));
    if notify_user {
      match &self.error {
        Some(error) => error!(error = %error, "flow stopped with error"),
        None => info!("flow stopped"),
      }
    }
    self.notifier.notify(ExecutionEvent::RuntimeStopped {
      error: self.error.clone(),
    });
  }

  /// Discard the flow-state tree and start clean. The breakpoint table
  /// survives a restart.
  pub fn restart(&mut self, debug_active: bool) -> Result<(), FlowError> {
    if !self.is_stopped() {
      self.stop(false);
    }
    self.error = None;
    self.flow_states.clear();
    self.root_states.clear();
    self.queue.clear();
    self.last_breakpoint_task = None;
    self.suspended_count = 0;
    self.globals = self
      .project
      .globals
      .iter()
      .map(|def| (def.name.clone(), def.value.clone()))
      .collect();
    self.set_state(RunState::Idle);
    self.start(debug_active)
  }

  pub fn pause(&mut self) {
    if self.state != RunState::Running {
      warn!(state = %self.state, "pause ignored");
      return;
    }
    self.set_state(RunState::Paused);
    self.notifier.notify(ExecutionEvent::RuntimePaused);
  }

  pub fn resume(&mut self) {
    if self.state != RunState::Paused {
      warn!(state = %self.state, "resume ignored");
      return;
    }
    self.set_state(RunState::Running);
    self.notifier.notify(ExecutionEvent::RuntimeResumed);
  }

  // ----------------------------------------------------------- scheduling

  /// Drain ready tasks for one tick.
  ///
  /// Runs at most the number of tasks that were queued on entry, so work
  /// enqueued during a tick runs on the next one. Returns how many tasks
  /// were dispatched. Errors raised by tasks never propagate out of here.
  pub fn pump(&mut self) -> usize {
    if self.state != RunState::Running {
      return 0;
    }

    self.process_completions();

    let budget = self.queue.len();
    let mut executed = 0;
    for _ in 0..budget {
      if self.state != RunState::Running {
        break;
      }
      if self.breakpoint_preempts() {
        self.set_state(RunState::Paused);
        self.notifier.notify(ExecutionEvent::RuntimePaused);
        break;
      }
      let Some(task) = self.queue.pop_front() else {
        break;
      };
      if self.last_breakpoint_task == Some(task.id) {
        self.last_breakpoint_task = None;
      }
      self.dispatch_task(task);
      executed += 1;
    }

    if self.state == RunState::Running && self.queue.is_empty() && self.suspended_count == 0 {
      debug!("queue drained");
      self.stop(false);
    }

    executed
  }

  /// Tick `pump()` until the runtime stops or the token cancels.
  ///
  /// A paused runtime keeps its queue and waits; cancellation stops it.
  pub async fn drive(&mut self, tick: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(tick);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          self.stop(false);
          break;
        }
        _ = interval.tick() => {
          self.pump();
          if self.is_stopped() {
            break;
          }
        }
      }
    }
  }

  /// Execute one task, then keep going while the step mode says the next
  /// task is outside the stepped flow state. Only valid while paused; the
  /// runtime stays paused afterwards.
  pub fn run_single_step(&mut self, mode: StepMode) -> usize {
    if self.state != RunState::Paused {
      warn!(state = %self.state, "single step ignored");
      return 0;
    }

    let Some(anchor) = self.queue.front().map(|task| task.flow_state) else {
      return 0;
    };

    let mut executed = 0;
    loop {
      let Some(task) = self.queue.pop_front() else {
        break;
      };
      if self.last_breakpoint_task == Some(task.id) {
        self.last_breakpoint_task = None;
      }
      self.dispatch_task(task);
      executed += 1;

      if self.is_stopped() {
        return executed;
      }
      let Some(head) = self.queue.front() else {
        break;
      };
      let stop_here = match mode {
        StepMode::Into => self.step_stops_into(anchor, head.flow_state),
        StepMode::Over => self.step_stops_over(anchor, head.flow_state),
        StepMode::Out => self.step_stops_out(anchor),
      };
      if stop_here {
        break;
      }
      // A breakpoint inside the skipped region still wins.
      if self.breakpoint_preempts() {
        break;
      }
    }
    executed
  }

  fn parent_of(&self, flow_state: Uuid) -> Option<Uuid> {
    self.flow_states.get(&flow_state).and_then(|fs| fs.parent)
  }

  fn step_stops_into(&self, anchor: Uuid, head: Uuid) -> bool {
    head == anchor || self.parent_of(anchor) == Some(head) || self.parent_of(head) == Some(anchor)
  }

  fn step_stops_over(&self, anchor: Uuid, head: Uuid) -> bool {
    head == anchor || self.parent_of(anchor) == Some(head)
  }

  fn step_stops_out(&self, anchor: Uuid) -> bool {
    self
      .flow_states
      .get(&anchor)
      .is_none_or(|fs| fs.is_finished)
  }

  /// Check the queue head against the breakpoint table. On a hit the
  /// exact task is retained at the head so resume or a single step
  /// re-dispatches it unchanged.
  fn breakpoint_preempts(&mut self) -> bool {
    let Some(head) = self.queue.front() else {
      return false;
    };
    if !self.breakpoint_enabled(&head.component) {
      return false;
    }
    if self.last_breakpoint_task == Some(head.id) {
      return false;
    }
    self.last_breakpoint_task = Some(head.id);
    info!(component = %head.component, "breakpoint hit");
    self.notifier.notify(ExecutionEvent::BreakpointHit {
      flow_state: head.flow_state,
      component: head.component.clone(),
    });
    true
  }

  fn process_completions(&mut self) {
    while let Ok(completion) = self.completions_rx.try_recv() {
      let Completion {
        flow_state,
        component,
        outcome,
      } = completion;

      let live = self
        .flow_states
        .get(&flow_state)
        .is_some_and(|fs| !fs.is_finished && fs.is_component_suspended(&component));
      if !live {
        debug!(%flow_state, %component, "dropping completion for torn-down flow state");
        continue;
      }

      self.suspended_count = self.suspended_count.saturating_sub(1);
      if let Some(fs) = self.flow_states.get_mut(&flow_state) {
        fs.component_state_mut(&component).set_suspended(false);
      }

      // The sequence output fires only after the completion itself has
      // been applied, never before.
      match outcome {
        CompletionOutcome::Sequence => {
          self.propagate_value(flow_state, &component, SEQ_OUT, Value::Null);
        }
        CompletionOutcome::Output { name, value } => {
          self.propagate_value(flow_state, &component, &name, value);
          self.propagate_value(flow_state, &component, SEQ_OUT, Value::Null);
        }
        CompletionOutcome::Error { message } => {
          self.throw_error(flow_state, &component, &message);
        }
      }

      if self.state != RunState::Running {
        break;
      }
      self.maybe_finish(flow_state);
    }
  }

  fn dispatch_task(&mut self, task: QueueTask) {
    let QueueTask {
      id,
      flow_state,
      component,
      line,
    } = task;

    let Some(fs) = self.flow_states.get_mut(&flow_state) else {
      return;
    };
    if fs.is_finished {
      return;
    }
    fs.active_tasks = fs.active_tasks.saturating_sub(1);
    let flow_id = fs.flow_id.clone();
    fs.component_state_mut(&component).begin_invocation();

    let Some(descriptor) = self.descriptor_for(&flow_id, &component) else {
      warn!(%flow_state, %component, "queued task has no descriptor");
      return;
    };

    match &line {
      Some(line) => debug!(
        %flow_state,
        %component,
        source = %line.source,
        output = %line.output,
        "dispatch"
      ),
      None => debug!(%flow_state, %component, "dispatch"),
    }
    self.notifier.notify(ExecutionEvent::TaskDispatched {
      task_id: id,
      flow_state,
      component: component.clone(),
    });

    let execute = Arc::clone(&descriptor.execute);
    let mut ctx = ExecuteCtx {
      rt: self,
      flow_state,
      component: component.clone(),
    };
    match (execute)(&mut ctx) {
      Ok(Execution::Completed) | Ok(Execution::Suspended) => {
        self.maybe_finish(flow_state);
      }
      Err(err) => {
        let error = FlowError::from_component(&component, err);
        self.fail_task(flow_state, &component, error);
      }
    }
  }

  /// Attach the error to the owning flow state, bubble it to the root,
  /// and stop the runtime. This is a whole-runtime fault.
  fn fail_task(&mut self, flow_state: Uuid, component: &str, error: FlowError) {
    let message = error.to_string();
    error!(%flow_state, %component, error = %message, "task failed");

    if let Some(fs) = self.flow_states.get_mut(&flow_state) {
      fs.error = Some(message.clone());
    }
    let mut root = flow_state;
    while let Some(parent) = self.parent_of(root) {
      root = parent;
    }
    if root != flow_state {
      if let Some(fs) = self.flow_states.get_mut(&root) {
        fs.error = Some(message.clone());
      }
    }

    self.error = Some(message.clone());
    self.notifier.notify(ExecutionEvent::ComponentFailed {
      flow_state,
      component: component.to_string(),
      error: message,
    });
    self.stop(true);
  }

  // ----------------------------------------------------- value propagation

  /// Deliver `value` along every connection line leaving
  /// `source.output`.
  pub fn propagate_value(&mut self, flow_state: Uuid, source: &str, output: &str, value: Value) {
    let project = Arc::clone(&self.project);
    let Some(flow_id) = self
      .flow_states
      .get(&flow_state)
      .map(|fs| fs.flow_id.clone())
    else {
      return;
    };
    let Some(flow) = project.get_flow(&flow_id) else {
      return;
    };
    for line in flow.lines_from(source, output) {
      self.set_input_value(
        flow_state,
        &line.target,
        &line.input,
        value.clone(),
        Some(LineRef {
          source: line.source.clone(),
          output: line.output.clone(),
          input: line.input.clone(),
        }),
      );
    }
  }

  /// Sugar: propagate through the sequence output with no data payload.
  pub fn propagate_value_through_seqout(&mut self, flow_state: Uuid, component: &str) {
    self.propagate_value(flow_state, component, SEQ_OUT, Value::Null);
  }

  /// Record a value in the component's current-invocation input snapshot;
  /// enqueue its execute task exactly once when every required input is
  /// fresh. Later deliveries to the same input overwrite (last
  /// propagation wins).
  pub fn set_input_value(
    &mut self,
    flow_state: Uuid,
    component: &str,
    input: &str,
    value: Value,
    line: Option<LineRef>,
  ) {
    let project = Arc::clone(&self.project);
    let registry = Arc::clone(&self.registry);

    let Some(fs) = self.flow_states.get(&flow_state) else {
      return;
    };
    if fs.is_finished {
      return;
    }
    let Some(flow) = project.get_flow(&fs.flow_id) else {
      return;
    };
    let Some(definition) = flow.get_component(component) else {
      warn!(%flow_state, %component, "value delivered to unknown component");
      return;
    };
    let Some(descriptor) = registry.get(&definition.kind) else {
      return;
    };
    let (has_seq, mandatory) = connected_inputs(flow, &descriptor, component);

    let ready = {
      let Some(fs) = self.flow_states.get_mut(&flow_state) else {
        return;
      };
      let state = fs.component_state_mut(component);
      state.record_input(input, value, input == SEQ_IN);
      if state.ready(has_seq, &mandatory) {
        state.mark_enqueued();
        true
      } else {
        false
      }
    };
    if ready {
      self.push_task(flow_state, component.to_string(), line);
    }
  }

  /// Raise a component execution error from outside a dispatch (used by
  /// asynchronously completing components).
  pub fn throw_error(&mut self, flow_state: Uuid, component: &str, message: &str) {
    let error = FlowError::ComponentExecution {
      component: component.to_string(),
      message: message.to_string(),
    };
    self.fail_task(flow_state, component, error);
  }

  /// Append a task to the queue. FIFO, subject only to breakpoint
  /// pre-emption at dispatch time.
  pub fn push_task(&mut self, flow_state: Uuid, component: String, line: Option<LineRef>) {
    self.next_task_id += 1;
    if let Some(fs) = self.flow_states.get_mut(&flow_state) {
      fs.active_tasks += 1;
    }
    self.queue.push_back(QueueTask {
      id: self.next_task_id,
      flow_state,
      component,
      line,
    });
  }

  // ------------------------------------------------------ flow-state tree

  /// Spawn a nested flow state under `parent` (sub-flow invocation or one
  /// item of a repeater).
  pub fn spawn_child(
    &mut self,
    parent: Uuid,
    flow_id: &str,
    index: Option<i64>,
  ) -> Result<Uuid, FlowError> {
    self.create_flow_state(flow_id, Some(parent), index)
  }

  fn create_flow_state(
    &mut self,
    flow_id: &str,
    parent: Option<Uuid>,
    index: Option<i64>,
  ) -> Result<Uuid, FlowError> {
    let project = Arc::clone(&self.project);
    let flow = project
      .get_flow(flow_id)
      .ok_or_else(|| FlowError::FlowNotFound(flow_id.to_string()))?;

    let mut fs = FlowState::new(flow, parent);
    if let Some(index) = index {
      fs.set_local("index", Value::Int(index));
    }
    let id = fs.id;
    self.flow_states.insert(id, fs);

    match parent {
      Some(parent_id) => {
        let Some(parent_fs) = self.flow_states.get_mut(&parent_id) else {
          self.flow_states.remove(&id);
          return Err(FlowError::StateNotFound(parent_id));
        };
        parent_fs.children.push(id);
      }
      None => self.root_states.push(id),
    }

    debug!(flow_state = %id, flow = %flow_id, ?parent, "flow state spawned");
    self.notifier.notify(ExecutionEvent::FlowStateSpawned {
      flow_state: id,
      flow: flow_id.to_string(),
      parent,
    });

    for component in flow.entry_components() {
      self.push_task(id, component.id.clone(), None);
    }
    Ok(id)
  }

  /// Destroy a flow state: children depth-first first, then release every
  /// native handle registered under it, then detach from the parent.
  fn destroy_flow_state(&mut self, flow_state: Uuid) {
    let Some(fs) = self.flow_states.get(&flow_state) else {
      return;
    };
    if fs.is_finished {
      return;
    }

    let children = fs.children.clone();
    for child in children {
      self.destroy_flow_state(child);
    }

    let Some(fs) = self.flow_states.get_mut(&flow_state) else {
      return;
    };
    let parent = fs.parent;
    let flow_id = fs.flow_id.clone();
    let suspended = fs.suspended_components();
    let handles = fs.take_native_handles();
    fs.is_finished = true;

    if let Some(bridge) = &self.bridge {
      for handle in handles {
        self.store.release_state(bridge.instance, handle);
      }
    }

    for component in suspended {
      self.suspended_count = self.suspended_count.saturating_sub(1);
      if let Some(descriptor) = self.descriptor_for(&flow_id, &component) {
        if let Some(abort) = &descriptor.abort {
          abort(flow_state, &component);
        }
      }
    }

    self.queue.retain(|task| task.flow_state != flow_state);

    if let Some(parent_id) = parent {
      if let Some(parent_fs) = self.flow_states.get_mut(&parent_id) {
        parent_fs.children.retain(|child| *child != flow_state);
      }
    }

    debug!(%flow_state, flow = %flow_id, "flow state destroyed");
    self
      .notifier
      .notify(ExecutionEvent::FlowStateFinished { flow_state });
  }

  /// A non-root flow state finishes once its queue share drains, nothing
  /// in it is suspended, and all children finished.
  fn maybe_finish(&mut self, flow_state: Uuid) {
    let finishable = {
      let Some(fs) = self.flow_states.get(&flow_state) else {
        return;
      };
      if fs.is_finished || fs.parent.is_none() {
        return;
      }
      fs.active_tasks == 0
        && !fs.has_suspended()
        && fs
          .children
          .iter()
          .all(|child| self.flow_states.get(child).is_none_or(|c| c.is_finished))
    };
    if finishable {
      let parent = self.parent_of(flow_state);
      self.destroy_flow_state(flow_state);
      if let Some(parent) = parent {
        self.maybe_finish(parent);
      }
    }
  }

  // --------------------------------------------------------------- scoping

  /// Variable lookup: local scope, then the parent chain, then globals.
  pub fn lookup_variable(&self, flow_state: Uuid, name: &str) -> Option<Value> {
    let mut cursor = Some(flow_state);
    while let Some(id) = cursor {
      let fs = self.flow_states.get(&id)?;
      if let Some(value) = fs.local(name) {
        return Some(value.clone());
      }
      cursor = fs.parent;
    }
    self.globals.get(name).cloned()
  }

  /// Write to the nearest enclosing scope defining `name`; fall through
  /// to a declared global; otherwise define a local in this scope.
  pub fn set_variable(&mut self, flow_state: Uuid, name: &str, value: Value) {
    let mut cursor = Some(flow_state);
    while let Some(id) = cursor {
      let Some(fs) = self.flow_states.get(&id) else {
        break;
      };
      if fs.has_local(name) {
        if let Some(fs) = self.flow_states.get_mut(&id) {
          fs.set_local(name, value);
        }
        return;
      }
      cursor = fs.parent;
    }
    if self.globals.contains_key(name) {
      self.globals.insert(name.to_string(), value);
      return;
    }
    if let Some(fs) = self.flow_states.get_mut(&flow_state) {
      fs.set_local(name, value);
    }
  }

  pub fn global(&self, name: &str) -> Option<&Value> {
    self.globals.get(name)
  }

  // ------------------------------------------------------------ expressions

  /// Evaluate an expression against a flow state's scope. Used for watch
  /// expressions; failures come back as strings and never unwind.
  pub fn eval_watch(&self, flow_state: Uuid, expression: &str) -> Result<Value, String> {
    if !self.flow_states.contains_key(&flow_state) {
      return Err(format!("flow state not found: {}", flow_state));
    }
    let scope = self.expression_scope(flow_state, None);
    self.evaluator.eval(&scope, expression)
  }

  fn eval_expression(
    &self,
    flow_state: Uuid,
    component: &str,
    expression: &str,
  ) -> Result<Value, String> {
    let scope = self.expression_scope(flow_state, Some(component));
    self.evaluator.eval(&scope, expression)
  }

  /// Scope seen by an expression: globals, shadowed by locals walking
  /// root → leaf, plus the component's inputs under `inputs`.
  fn expression_scope(&self, flow_state: Uuid, component: Option<&str>) -> serde_json::Value {
    let mut scope = serde_json::Map::new();
    for (name, value) in &self.globals {
      scope.insert(name.clone(), value.to_json());
    }

    let mut chain = Vec::new();
    let mut cursor = Some(flow_state);
    while let Some(id) = cursor {
      let Some(fs) = self.flow_states.get(&id) else {
        break;
      };
      chain.push(id);
      cursor = fs.parent;
    }
    for id in chain.into_iter().rev() {
      if let Some(fs) = self.flow_states.get(&id) {
        for (name, value) in fs.locals() {
          scope.insert(name.to_string(), value.to_json());
        }
      }
    }

    if let (Some(component), Some(fs)) = (component, self.flow_states.get(&flow_state)) {
      let mut inputs = serde_json::Map::new();
      if let Some(state) = fs.component_state(component) {
        for (name, value) in state.inputs() {
          inputs.insert(name.to_string(), value.to_json());
        }
      }
      scope.insert("inputs".to_string(), serde_json::Value::Object(inputs));
    }

    serde_json::Value::Object(scope)
  }

  // ------------------------------------------------------------ breakpoints

  /// Breakpoint mutations are visible to the scheduler on the very next
  /// pump; the table belongs to this runtime alone.
  pub fn add_breakpoint(&mut self, component: &str) {
    self
      .breakpoints
      .insert(component.to_string(), Breakpoint { enabled: true });
  }

  pub fn remove_breakpoint(&mut self, component: &str) {
    self.breakpoints.remove(component);
  }

  pub fn enable_breakpoint(&mut self, component: &str) {
    if let Some(breakpoint) = self.breakpoints.get_mut(component) {
      breakpoint.enabled = true;
    }
  }

  pub fn disable_breakpoint(&mut self, component: &str) {
    if let Some(breakpoint) = self.breakpoints.get_mut(component) {
      breakpoint.enabled = false;
    }
  }

  pub fn breakpoint_enabled(&self, component: &str) -> bool {
    self
      .breakpoints
      .get(component)
      .is_some_and(|breakpoint| breakpoint.enabled)
  }

  pub fn breakpoints(&self) -> impl Iterator<Item = (&str, Breakpoint)> {
    self
      .breakpoints
      .iter()
      .map(|(component, breakpoint)| (component.as_str(), *breakpoint))
  }

  // ------------------------------------------------------------------ views

  pub fn root_flow_states(&self) -> &[Uuid] {
    &self.root_states
  }

  pub fn flow_state(&self, id: Uuid) -> Option<&FlowState> {
    self.flow_states.get(&id)
  }

  /// The task the scheduler would dispatch next.
  pub fn next_task(&self) -> Option<&QueueTask> {
    self.queue.front()
  }

  pub fn queue_len(&self) -> usize {
    self.queue.len()
  }

  /// Read-only snapshot of the pending queue, for the debugger UI.
  pub fn queue_snapshot(&self) -> Vec<TaskSnapshot> {
    self
      .queue
      .iter()
      .map(|task| TaskSnapshot {
        id: task.id,
        flow_state: task.flow_state,
        component: task.component.clone(),
        description: task.describe(),
      })
      .collect()
  }

  // --------------------------------------------------------------- settings

  pub fn read_setting(&self, key: &str) -> Option<&serde_json::Value> {
    self.settings.read(key)
  }

  pub fn write_setting(&mut self, key: &str, value: serde_json::Value) {
    self.settings.write(key, value);
  }

  fn save_settings(&mut self) {
    let persistent: HashMap<String, Value> = self
      .project
      .globals
      .iter()
      .filter(|def| def.persistent)
      .filter_map(|def| {
        self
          .globals
          .get(&def.name)
          .map(|value| (def.name.clone(), value.clone()))
      })
      .collect();
    if !persistent.is_empty() {
      self.settings.set_persistent_variables(&persistent);
    }
    if let Err(e) = self.settings.save() {
      warn!(error = %e, "failed to save runtime settings");
    }
  }

  // ------------------------------------------------------------------ bridge

  /// Attach and initialize a compiled backend. A `BridgeError` here is
  /// returned to the caller; the runtime stays in its current state.
  pub fn attach_native_engine(
    &mut self,
    mut engine: Box<dyn NativeEngine>,
    assets: &[u8],
  ) -> Result<EngineInstanceId, BridgeError> {
    engine.init(assets)?;
    let instance = EngineInstanceId(self.next_engine_instance);
    self.next_engine_instance += 1;
    info!(%instance, "native engine attached");
    self.bridge = Some(NativeBridge { engine, instance });
    Ok(instance)
  }

  pub fn native_engine(&mut self) -> Option<&mut dyn NativeEngine> {
    match self.bridge.as_mut() {
      Some(bridge) => Some(bridge.engine.as_mut()),
      None => None,
    }
  }

  pub fn engine_instance(&self) -> Option<EngineInstanceId> {
    self.bridge.as_ref().map(|bridge| bridge.instance)
  }

  pub fn bridge_store(&self) -> &BridgeStateStore {
    &self.store
  }

  /// Hand out the completion sender so hosts can re-enter the queue from
  /// long-running work they manage themselves.
  pub fn completion_sender(&self) -> UnboundedSender<Completion> {
    self.completions_tx.clone()
  }

  // ----------------------------------------------------------------- lookup

  fn descriptor_for(&self, flow_id: &str, component: &str) -> Option<Arc<ComponentDescriptor>> {
    let flow = self.project.get_flow(flow_id)?;
    let definition = flow.get_component(component)?;
    self.registry.get(&definition.kind)
  }
}

/// Connected-input shape of a component: whether any sequence input is
/// wired, and which mandatory data inputs are.
fn connected_inputs(
  flow: &Flow,
  descriptor: &ComponentDescriptor,
  component: &str,
) -> (bool, Vec<String>) {
  let mut has_seq = false;
  let mut mandatory = Vec::new();
  for line in flow.lines_into(component) {
    if line.input == SEQ_IN {
      has_seq = true;
    } else if let Some(pin) = descriptor.input(&line.input) {
      if !pin.optional && !mandatory.contains(&pin.name) {
        mandatory.push(pin.name.clone());
      }
    }
  }
  (has_seq, mandatory)
}

/// Execution context handed to component behaviors. Borrows the runtime
/// for the duration of one dispatch.
struct ExecuteCtx<'a, N: ExecutionNotifier> {
  rt: &'a mut Runtime<N>,
  flow_state: Uuid,
  component: String,
}

impl<N: ExecutionNotifier> ExecuteCtx<'_, N> {
  fn property(&self, name: &str) -> Option<PropertyValue> {
    let fs = self.rt.flow_states.get(&self.flow_state)?;
    let flow = self.rt.project.get_flow(&fs.flow_id)?;
    flow.get_component(&self.component)?.property(name).cloned()
  }
}

impl<N: ExecutionNotifier> ComponentContext for ExecuteCtx<'_, N> {
  fn component_id(&self) -> &str {
    &self.component
  }

  fn input(&self, name: &str) -> Option<Value> {
    self
      .rt
      .flow_states
      .get(&self.flow_state)?
      .component_input(&self.component, name)
  }

  fn eval_property(&mut self, name: &str) -> Result<Value, ComponentError> {
    match self.property(name) {
      None => Err(ComponentError::missing_property(name)),
      Some(PropertyValue::Literal(value)) => Ok(value),
      Some(PropertyValue::Expression(expression)) => self
        .rt
        .eval_expression(self.flow_state, &self.component, &expression)
        .map_err(|message| ComponentError::Expression {
          expression,
          message,
        }),
    }
  }

  fn eval_property_with_type(
    &mut self,
    name: &str,
    ty: PinType,
  ) -> Result<Value, ComponentError> {
    let value = self.eval_property(name)?;
    coerce_value(value, ty).map_err(|message| ComponentError::Property {
      name: name.to_string(),
      message,
    })
  }

  fn get_variable(&self, name: &str) -> Option<Value> {
    self.rt.lookup_variable(self.flow_state, name)
  }

  fn set_variable(&mut self, name: &str, value: Value) {
    self.rt.set_variable(self.flow_state, name, value);
  }

  fn assign(&mut self, assignable: &str, value: Value) -> Result<(), ComponentError> {
    if let Some(output) = assignable.strip_prefix("outputs.") {
      let output = output.to_string();
      self.propagate(&output, value);
      return Ok(());
    }
    if assignable.is_empty() || assignable.contains(char::is_whitespace) {
      return Err(ComponentError::Failed(format!(
        "cannot assign to '{}'",
        assignable
      )));
    }
    self.set_variable(assignable, value);
    Ok(())
  }

  fn propagate(&mut self, output: &str, value: Value) {
    self
      .rt
      .propagate_value(self.flow_state, &self.component, output, value);
  }

  fn propagate_seqout(&mut self) {
    self
      .rt
      .propagate_value_through_seqout(self.flow_state, &self.component);
  }

  fn spawn_flow(&mut self, flow_id: &str, index: Option<i64>) -> Result<(), ComponentError> {
    self
      .rt
      .spawn_child(self.flow_state, flow_id, index)
      .map(|_| ())
      .map_err(|e| ComponentError::Failed(e.to_string()))
  }

  fn async_handle(&mut self) -> AsyncHandle {
    let newly_suspended = match self.rt.flow_states.get_mut(&self.flow_state) {
      Some(fs) => {
        let state = fs.component_state_mut(&self.component);
        if state.is_suspended() {
          false
        } else {
          state.set_suspended(true);
          true
        }
      }
      None => false,
    };
    if newly_suspended {
      self.rt.suspended_count += 1;
    }
    AsyncHandle::new(
      self.rt.completions_tx.clone(),
      self.flow_state,
      self.component.clone(),
    )
  }

  fn native_engine(&mut self) -> Option<&mut dyn NativeEngine> {
    self.rt.native_engine()
  }

  fn register_native_state(
    &mut self,
    object: Arc<dyn NativeState>,
  ) -> Result<StateHandle, ComponentError> {
    let Some(instance) = self.rt.engine_instance() else {
      return Err(ComponentError::Failed(
        "no native engine attached to this runtime".to_string(),
      ));
    };
    let handle = self.rt.store.register_state(instance, object);
    if let Some(fs) = self.rt.flow_states.get_mut(&self.flow_state) {
      fs.push_native_handle(&self.component, handle);
    }
    Ok(handle)
  }

  fn has_native_state(&self) -> bool {
    self
      .rt
      .flow_states
      .get(&self.flow_state)
      .is_some_and(|fs| fs.has_native_state(&self.component))
  }

  fn log(&mut self, message: &str) {
    info!(flow_state = %self.flow_state, component = %self.component, "{}", message);
    self.rt.notifier.notify(ExecutionEvent::ComponentLog {
      flow_state: self.flow_state,
      component: self.component.clone(),
      message: message.to_string(),
    });
  }
}
