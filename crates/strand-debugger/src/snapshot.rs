//! Read-only view of the live flow-state tree.

use serde::Serialize;
use uuid::Uuid;

use strand_runtime::{ExecutionNotifier, Runtime};

/// One node of the active-flows panel.
#[derive(Debug, Clone, Serialize)]
pub struct FlowStateSnapshot {
  pub id: Uuid,
  pub flow: String,
  pub error: Option<String>,
  pub is_finished: bool,
  pub children: Vec<FlowStateSnapshot>,
}

/// Snapshot the live flow-state tree, roots first.
pub fn active_flows<N: ExecutionNotifier>(runtime: &Runtime<N>) -> Vec<FlowStateSnapshot> {
  runtime
    .root_flow_states()
    .iter()
    .filter_map(|id| snapshot(runtime, *id))
    .collect()
}

fn snapshot<N: ExecutionNotifier>(runtime: &Runtime<N>, id: Uuid) -> Option<FlowStateSnapshot> {
  let state = runtime.flow_state(id)?;
  Some(FlowStateSnapshot {
    id: state.id,
    flow: state.flow_id.clone(),
    error: state.error.clone(),
    is_finished: state.is_finished,
    children: state
      .children
      .iter()
      .filter_map(|child| snapshot(runtime, *child))
      .collect(),
  })
}
