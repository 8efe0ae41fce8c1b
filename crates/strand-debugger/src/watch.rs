//! Watch expressions.
//!
//! Watches are re-evaluated against the currently inspected flow state
//! whenever the debugger is paused. A failing watch produces a per-watch
//! error string; it never aborts the pause.

use serde::Serialize;
use uuid::Uuid;

use strand_flow::Value;
use strand_runtime::{ExecutionNotifier, Runtime};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Watch {
  pub id: u64,
  pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WatchOutcome {
  Value(Value),
  Error(String),
}

/// One evaluated watch, ready for the watch panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchEvaluation {
  pub id: u64,
  pub expression: String,
  pub outcome: WatchOutcome,
}

/// The watch list of one debug session. Belongs to exactly one runtime.
#[derive(Debug, Default)]
pub struct WatchList {
  next_id: u64,
  watches: Vec<Watch>,
}

impl WatchList {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, expression: impl Into<String>) -> u64 {
    self.next_id += 1;
    self.watches.push(Watch {
      id: self.next_id,
      expression: expression.into(),
    });
    self.next_id
  }

  pub fn remove(&mut self, id: u64) -> bool {
    let before = self.watches.len();
    self.watches.retain(|watch| watch.id != id);
    self.watches.len() != before
  }

  pub fn iter(&self) -> impl Iterator<Item = &Watch> {
    self.watches.iter()
  }

  pub fn len(&self) -> usize {
    self.watches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.watches.is_empty()
  }

  /// Evaluate every watch against the inspected flow state.
  pub fn evaluate_all<N: ExecutionNotifier>(
    &self,
    runtime: &Runtime<N>,
    flow_state: Uuid,
  ) -> Vec<WatchEvaluation> {
    self
      .watches
      .iter()
      .map(|watch| {
        let outcome = match runtime.eval_watch(flow_state, &watch.expression) {
          Ok(value) => WatchOutcome::Value(value),
          Err(message) => WatchOutcome::Error(message),
        };
        WatchEvaluation {
          id: watch.id,
          expression: watch.expression.clone(),
          outcome,
        }
      })
      .collect()
  }
}
