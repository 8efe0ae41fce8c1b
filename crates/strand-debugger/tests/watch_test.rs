//! Watch evaluation and the active-flows view.

use std::sync::Arc;

use strand_debugger::{WatchList, WatchOutcome, active_flows};
use strand_flow::{Component, ComponentRegistry, Flow, FlowProject, Value, VariableDef};
use strand_runtime::Runtime;

fn project_with_local() -> FlowProject {
  let mut flow = Flow::new("main");
  flow.local_variables.push(VariableDef {
    name: "x".to_string(),
    value: Value::Int(41),
    persistent: false,
  });
  flow.components.push(Component::new("s", "start"));
  FlowProject {
    name: "watched".to_string(),
    flows: vec![flow],
    roots: vec!["main".to_string()],
    globals: vec![VariableDef {
      name: "g".to_string(),
      value: Value::String("hello".to_string()),
      persistent: false,
    }],
  }
}

fn paused_runtime() -> Runtime {
  let registry = Arc::new(ComponentRegistry::with_builtins());
  let mut rt = Runtime::new(project_with_local(), registry).expect("runtime");
  rt.start(true).expect("start");
  rt.pause();
  rt
}

#[test]
fn watches_evaluate_against_the_inspected_flow_state() {
  let rt = paused_runtime();
  let root = rt.root_flow_states()[0];

  let mut watches = WatchList::new();
  watches.add("x + 1");
  watches.add("g");

  let evaluated = watches.evaluate_all(&rt, root);
  assert_eq!(evaluated.len(), 2);
  assert_eq!(evaluated[0].outcome, WatchOutcome::Value(Value::Int(42)));
  assert_eq!(
    evaluated[1].outcome,
    WatchOutcome::Value(Value::String("hello".to_string()))
  );
}

#[test]
fn a_failing_watch_yields_an_error_string_and_the_rest_still_evaluate() {
  let rt = paused_runtime();
  let root = rt.root_flow_states()[0];

  let mut watches = WatchList::new();
  watches.add("1 / 0");
  watches.add("x");

  let evaluated = watches.evaluate_all(&rt, root);
  assert!(matches!(evaluated[0].outcome, WatchOutcome::Error(_)));
  assert_eq!(evaluated[1].outcome, WatchOutcome::Value(Value::Int(41)));
}

#[test]
fn removing_a_watch_stops_evaluating_it() {
  let rt = paused_runtime();
  let root = rt.root_flow_states()[0];

  let mut watches = WatchList::new();
  let id = watches.add("x");
  watches.add("g");

  assert!(watches.remove(id));
  assert!(!watches.remove(id));

  let evaluated = watches.evaluate_all(&rt, root);
  assert_eq!(evaluated.len(), 1);
  assert_eq!(evaluated[0].expression, "g");
}

#[test]
fn active_flows_snapshots_the_state_tree() {
  let rt = paused_runtime();

  let snapshots = active_flows(&rt);
  assert_eq!(snapshots.len(), 1);
  assert_eq!(snapshots[0].flow, "main");
  assert!(!snapshots[0].is_finished);
  assert!(snapshots[0].children.is_empty());
  assert!(snapshots[0].error.is_none());
}
