//! Execution events and notifiers for the debugger UI and other hosts.
//!
//! Events are emitted as the scheduler works; consumers decide what to do
//! with them (drive an error dialog, highlight the active connection line,
//! append to a log panel, ignore).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events emitted by a running flow runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The runtime started.
  RuntimeStarted { run_id: String, debug_active: bool },

  /// The runtime paused (explicitly or on a breakpoint).
  RuntimePaused,

  /// The runtime resumed from a pause.
  RuntimeResumed,

  /// The runtime stopped; `error` carries the failure text if any.
  RuntimeStopped { error: Option<String> },

  /// A queue task is about to run its component.
  TaskDispatched {
    task_id: u64,
    flow_state: Uuid,
    component: String,
  },

  /// The scheduler pre-empted dispatch on an enabled breakpoint.
  BreakpointHit { flow_state: Uuid, component: String },

  /// A component's execution failed; the runtime is stopping.
  ComponentFailed {
    flow_state: Uuid,
    component: String,
    error: String,
  },

  /// A component wrote to the runtime log.
  ComponentLog {
    flow_state: Uuid,
    component: String,
    message: String,
  },

  /// A nested flow state was spawned.
  FlowStateSpawned {
    flow_state: Uuid,
    flow: String,
    parent: Option<Uuid>,
  },

  /// A flow state finished and was torn down.
  FlowStateFinished { flow_state: Uuid },
}

/// Trait for receiving execution events.
///
/// The runtime calls `notify` for each event; implementations decide what
/// to do with them.
pub trait ExecutionNotifier: Send {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {
    // Intentionally empty
  }
}

/// A notifier that sends events to an unbounded channel.
///
/// Unbounded so a slow consumer can never block the pump; event volume is
/// one per task dispatch at most.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
