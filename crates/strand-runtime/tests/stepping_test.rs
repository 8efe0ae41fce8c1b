//! Breakpoints, pause/resume fidelity, and the three single-step modes.

use std::sync::{Arc, Mutex};

use strand_flow::{
  Component, ComponentContext, ComponentDescriptor, ComponentRegistry, ConnectionLine, Execution,
  Flow, FlowProject, PropertyValue, SEQ_IN, SEQ_OUT, Value,
};
use strand_runtime::{RunState, Runtime, StepMode, StopReason};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
  Arc::new(Mutex::new(Vec::new()))
}

fn logged(log: &Log) -> Vec<String> {
  log.lock().expect("log lock").clone()
}

fn probe(log: &Log) -> ComponentDescriptor {
  let log = log.clone();
  ComponentDescriptor::new(
    "probe",
    Arc::new(move |ctx: &mut dyn ComponentContext| {
      log.lock().expect("log lock").push(ctx.component_id().to_string());
      ctx.propagate_seqout();
      Ok(Execution::Completed)
    }),
  )
}

fn registry(log: &Log) -> Arc<ComponentRegistry> {
  let mut registry = ComponentRegistry::with_builtins();
  registry.register(probe(log)).expect("register probe");
  Arc::new(registry)
}

fn project(flows: Vec<Flow>, roots: Vec<&str>) -> FlowProject {
  FlowProject {
    name: "test".to_string(),
    flows,
    roots: roots.into_iter().map(String::from).collect(),
    globals: Vec::new(),
  }
}

/// a -> b -> c probes, with an authored breakpoint on b.
fn chain_with_breakpoint() -> Flow {
  let mut flow = Flow::new("main");
  flow.components.push(Component::new("a", "probe"));
  flow.components.push(Component::new("b", "probe").with_breakpoint());
  flow.components.push(Component::new("c", "probe"));
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "b", SEQ_IN));
  flow
    .connection_lines
    .push(ConnectionLine::new("b", SEQ_OUT, "c", SEQ_IN));
  flow
}

/// Parent flow calling a child flow, then a follow-up component.
fn call_project() -> FlowProject {
  let mut child = Flow::new("child");
  child.components.push(Component::new("inner", "probe"));

  let mut main = Flow::new("main");
  main.components.push(
    Component::new("call", "call-flow")
      .with_property("flow", PropertyValue::Literal(Value::String("child".to_string()))),
  );
  main.components.push(Component::new("after", "probe"));
  main
    .connection_lines
    .push(ConnectionLine::new("call", SEQ_OUT, "after", SEQ_IN));

  project(vec![main, child], vec!["main"])
}

fn pump_to_pause<N: strand_runtime::ExecutionNotifier>(rt: &mut Runtime<N>) {
  let mut ticks = 0;
  while !rt.is_paused() && !rt.is_stopped() {
    rt.pump();
    ticks += 1;
    assert!(ticks < 1000, "runtime neither paused nor stopped");
  }
}

#[test]
fn pause_and_resume_preserve_the_pending_queue() {
  let log = new_log();
  let mut flow = Flow::new("main");
  for id in ["a", "b", "c"] {
    flow.components.push(Component::new(id, "probe"));
  }
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "b", SEQ_IN));
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "c", SEQ_IN));

  let mut rt = Runtime::new(project(vec![flow], vec!["main"]), registry(&log)).expect("runtime");
  rt.start(false).expect("start");

  // One tick: a executes, b and c are now pending.
  rt.pump();
  assert_eq!(logged(&log), ["a"]);

  rt.pause();
  let before: Vec<(u64, String)> = rt
    .queue_snapshot()
    .into_iter()
    .map(|t| (t.id, t.component))
    .collect();
  assert_eq!(before.len(), 2);

  // Pumping while paused does nothing.
  rt.pump();
  assert_eq!(logged(&log), ["a"]);

  rt.resume();
  let after: Vec<(u64, String)> = rt
    .queue_snapshot()
    .into_iter()
    .map(|t| (t.id, t.component))
    .collect();
  assert_eq!(before, after, "pause/resume kept queue contents and order");

  while !rt.is_stopped() {
    rt.pump();
  }
  assert_eq!(logged(&log), ["a", "b", "c"]);
}

#[test]
fn breakpoint_pauses_before_the_component_and_step_over_advances() {
  let log = new_log();
  let mut rt = Runtime::new(
    project(vec![chain_with_breakpoint()], vec!["main"]),
    registry(&log),
  )
  .expect("runtime");

  rt.start(true).expect("start");
  pump_to_pause(&mut rt);

  // a ran; paused before b, with b's task retained at the queue head.
  assert_eq!(rt.state(), RunState::Paused);
  assert_eq!(logged(&log), ["a"]);
  let head = rt.next_task().expect("pending task").clone();
  assert_eq!(head.component, "b");

  // Step over: b executes, paused again before c.
  rt.run_single_step(StepMode::Over);
  assert_eq!(rt.state(), RunState::Paused);
  assert_eq!(logged(&log), ["a", "b"]);
  assert_eq!(rt.next_task().expect("pending task").component, "c");

  rt.resume();
  while !rt.is_stopped() {
    rt.pump();
  }
  assert_eq!(logged(&log), ["a", "b", "c"]);
  assert_eq!(rt.state(), RunState::Stopped(StopReason::Success));
}

#[test]
fn resume_redispatches_the_retained_breakpoint_task_unchanged() {
  let log = new_log();
  let mut rt = Runtime::new(
    project(vec![chain_with_breakpoint()], vec!["main"]),
    registry(&log),
  )
  .expect("runtime");

  rt.start(true).expect("start");
  pump_to_pause(&mut rt);

  let retained = rt.next_task().expect("pending task").id;

  rt.resume();
  rt.pump();

  // The exact task ran once; it was neither lost nor duplicated.
  assert!(logged(&log).iter().filter(|c| c.as_str() == "b").count() == 1);
  assert!(rt.queue_snapshot().iter().all(|t| t.id != retained));
}

#[test]
fn breakpoint_mutations_are_visible_on_the_next_pump() {
  let log = new_log();
  let mut rt = Runtime::new(
    project(vec![chain_with_breakpoint()], vec!["main"]),
    registry(&log),
  )
  .expect("runtime");

  rt.start(true).expect("start");
  rt.disable_breakpoint("b");
  while !rt.is_stopped() {
    rt.pump();
  }

  // Disabled before the first pump reached b: no pause at all.
  assert_eq!(logged(&log), ["a", "b", "c"]);
  assert_eq!(rt.state(), RunState::Stopped(StopReason::Success));
}

#[test]
fn step_into_stops_at_the_first_task_of_a_spawned_child() {
  let log = new_log();
  let mut rt = Runtime::new(call_project(), registry(&log)).expect("runtime");
  rt.start(true).expect("start");
  rt.add_breakpoint("call");
  pump_to_pause(&mut rt);
  assert_eq!(rt.next_task().expect("pending").component, "call");

  let root = rt.root_flow_states()[0];
  rt.run_single_step(StepMode::Into);

  // The call executed; we are paused at the child's first task.
  assert_eq!(rt.state(), RunState::Paused);
  let head = rt.next_task().expect("pending task");
  assert_eq!(head.component, "inner");
  let child_state = rt.flow_state(head.flow_state).expect("child state");
  assert_eq!(child_state.parent, Some(root));
  assert!(logged(&log).is_empty(), "child body has not run yet");
}

#[test]
fn step_over_treats_the_child_flow_as_atomic() {
  let log = new_log();
  let mut rt = Runtime::new(call_project(), registry(&log)).expect("runtime");
  rt.start(true).expect("start");
  rt.add_breakpoint("call");
  pump_to_pause(&mut rt);

  rt.run_single_step(StepMode::Over);

  // The whole child ran; paused before the follow-up in the parent.
  assert_eq!(rt.state(), RunState::Paused);
  assert_eq!(logged(&log), ["inner"]);
  assert_eq!(rt.next_task().expect("pending task").component, "after");
}

#[test]
fn step_out_runs_until_the_child_flow_state_finishes() {
  let log = new_log();
  let mut rt = Runtime::new(call_project(), registry(&log)).expect("runtime");
  rt.start(true).expect("start");
  rt.add_breakpoint("call");
  pump_to_pause(&mut rt);

  // Into the child first.
  rt.run_single_step(StepMode::Into);
  let child = rt.next_task().expect("pending task").flow_state;

  // Out: the child drains and finishes; control is back in the parent.
  rt.run_single_step(StepMode::Out);
  assert_eq!(rt.state(), RunState::Paused);
  assert_eq!(logged(&log), ["inner"]);
  assert!(
    rt.flow_state(child).is_none_or(|fs| fs.is_finished),
    "child flow state finished"
  );
  assert_eq!(rt.next_task().expect("pending task").component, "after");
}
