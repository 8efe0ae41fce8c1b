//! Queue tasks.

use serde::Serialize;
use uuid::Uuid;

/// The connection line whose delivery triggered a task.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRef {
  pub source: String,
  pub output: String,
  pub input: String,
}

/// One pending unit of scheduled work, owned exclusively by one runtime's
/// queue.
///
/// The delivered value itself is committed to the target's input snapshot
/// at propagation time (last propagation wins); the task records which
/// component to run and, for value deliveries, the line that triggered it.
/// A task with no line is a sequence continuation or an entry seed.
#[derive(Debug, Clone)]
pub struct QueueTask {
  pub id: u64,
  pub flow_state: Uuid,
  pub component: String,
  pub line: Option<LineRef>,
}

impl QueueTask {
  pub fn describe(&self) -> String {
    match &self.line {
      Some(line) => format!(
        "deliver {}.{} -> {}.{}",
        line.source, line.output, self.component, line.input
      ),
      None => format!("continue {}", self.component),
    }
  }
}

/// Read-only task description for the debugger's queue view.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
  pub id: u64,
  pub flow_state: Uuid,
  pub component: String,
  pub description: String,
}
