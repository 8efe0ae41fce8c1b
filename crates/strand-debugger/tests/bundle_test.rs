//! Debug bundle capture, save/load, failure modes, and replay.

use std::sync::Arc;

use strand_debugger::{
  BundleError, DebugBundle, ReplayRuntime, WatchList, load_debug_bundle, save_debug_bundle,
};
use strand_flow::{
  Component, ComponentRegistry, ConnectionLine, Flow, FlowProject, PropertyValue, SEQ_IN, SEQ_OUT,
  Value,
};
use strand_runtime::Runtime;

fn sample_project() -> FlowProject {
  let mut flow = Flow::new("main");
  flow
    .components
    .push(Component::new("a", "start").with_breakpoint());
  flow.components.push(
    Component::new("b", "log")
      .with_property("message", PropertyValue::Literal(Value::String("hi".to_string()))),
  );
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "b", SEQ_IN));
  FlowProject {
    name: "sample".to_string(),
    flows: vec![flow],
    roots: vec!["main".to_string()],
    globals: Vec::new(),
  }
}

fn sample_runtime() -> Runtime {
  let registry = Arc::new(ComponentRegistry::with_builtins());
  let mut rt = Runtime::new(sample_project(), registry).expect("runtime");
  rt.start(true).expect("start");
  rt
}

#[test]
fn capture_save_load_roundtrip() {
  let rt = sample_runtime();
  let mut watches = WatchList::new();
  watches.add("counter + 1");
  watches.add("inputs.value");

  let bundle = DebugBundle::capture(&rt, &watches);
  assert_eq!(bundle.components.len(), 2);
  assert_eq!(bundle.components["b"].kind, "log");
  assert_eq!(bundle.components["b"].flow, "main");
  // The authored breakpoint on `a` was seeded and captured.
  assert!(
    bundle
      .breakpoints
      .iter()
      .any(|entry| entry.component == "a" && entry.enabled)
  );

  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("session.strand-debug");
  save_debug_bundle(&path, &bundle).expect("save bundle");

  let loaded = load_debug_bundle(&path).expect("load bundle");
  assert_eq!(loaded, bundle);
}

#[test]
fn loading_a_non_archive_file_fails_without_partial_state() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("not-an-archive.strand-debug");
  std::fs::write(&path, "this is not a gzip archive").expect("write");

  let err = load_debug_bundle(&path).unwrap_err();
  assert!(matches!(err, BundleError::Malformed { .. }), "got: {err}");

  // The replay constructor surfaces the same error and commits nothing.
  assert!(ReplayRuntime::load(&path).is_err());
}

#[test]
fn loading_a_missing_file_reports_unreachable() {
  let dir = tempfile::tempdir().expect("tempdir");
  let err = load_debug_bundle(&dir.path().join("missing.strand-debug")).unwrap_err();
  assert!(matches!(err, BundleError::Unreachable { .. }), "got: {err}");
}

#[test]
fn loading_an_unsupported_version_fails() {
  let rt = sample_runtime();
  let mut bundle = DebugBundle::capture(&rt, &WatchList::new());
  bundle.version = 99;

  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("future.strand-debug");
  save_debug_bundle(&path, &bundle).expect("save bundle");

  let err = load_debug_bundle(&path).unwrap_err();
  assert!(matches!(err, BundleError::UnsupportedVersion(99)), "got: {err}");
}

#[test]
fn replay_session_is_read_only_until_made_live() {
  let rt = sample_runtime();
  let mut watches = WatchList::new();
  watches.add("counter");

  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("session.strand-debug");
  save_debug_bundle(&path, &DebugBundle::capture(&rt, &watches)).expect("save bundle");

  let mut replay = ReplayRuntime::load(&path).expect("load replay");

  // Scheduler and debugger operations are no-ops.
  replay.start(true);
  replay.pause();
  replay.resume();
  replay.run_single_step(strand_runtime::StepMode::Over);
  assert_eq!(replay.pump(), 0);
  assert_eq!(replay.component_metadata("a").map(|m| m.kind.as_str()), Some("start"));

  // Toggling back to a live session seeds the captured state.
  let registry = Arc::new(ComponentRegistry::with_builtins());
  let mut live = Runtime::new(sample_project(), registry).expect("runtime");
  let mut live_watches = WatchList::new();
  replay.apply_to_live(&mut live, &mut live_watches);

  assert!(live.breakpoint_enabled("a"));
  assert_eq!(live_watches.len(), 1);
}
