//! Runtime settings persistence: key/value round-trip and persistent
//! global variables surviving across runs.

use std::sync::Arc;

use strand_flow::{
  Component, ComponentRegistry, Flow, FlowProject, PropertyValue, Value, VariableDef,
};
use strand_runtime::{RunState, Runtime, RuntimeSettings, StopReason};

fn counter_project() -> FlowProject {
  let mut flow = Flow::new("main");
  flow.components.push(
    Component::new("bump", "set-variable")
      .with_property(
        "variable",
        PropertyValue::Literal(Value::String("counter".to_string())),
      )
      .with_property(
        "value",
        PropertyValue::Expression("counter + 1".to_string()),
      ),
  );
  FlowProject {
    name: "counting".to_string(),
    flows: vec![flow],
    roots: vec!["main".to_string()],
    globals: vec![VariableDef {
      name: "counter".to_string(),
      value: Value::Int(0),
      persistent: true,
    }],
  }
}

fn run_once(settings: RuntimeSettings) -> Value {
  let registry = Arc::new(ComponentRegistry::with_builtins());
  let mut rt = Runtime::new(counter_project(), registry)
    .expect("runtime")
    .with_settings(settings);
  rt.start(false).expect("start");
  let mut ticks = 0;
  while !rt.is_stopped() {
    rt.pump();
    ticks += 1;
    assert!(ticks < 100, "runtime did not terminate");
  }
  assert_eq!(rt.state(), RunState::Stopped(StopReason::Success));
  rt.global("counter").expect("counter global").clone()
}

#[test]
fn missing_settings_file_loads_as_empty() {
  let dir = tempfile::tempdir().expect("tempdir");
  let settings = RuntimeSettings::load(dir.path().join("nope.strand-settings"));
  assert!(settings.read("anything").is_none());
}

#[test]
fn key_value_settings_roundtrip_through_disk() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("proj.strand-settings");

  let mut settings = RuntimeSettings::load(path.clone());
  settings.write("volume", serde_json::json!(11));
  settings.save().expect("save settings");

  let reloaded = RuntimeSettings::load(path);
  assert_eq!(reloaded.read("volume"), Some(&serde_json::json!(11)));
}

#[test]
fn malformed_settings_file_is_discarded() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("broken.strand-settings");
  std::fs::write(&path, "not json at all").expect("write");

  let settings = RuntimeSettings::load(path);
  assert!(settings.read("anything").is_none());
}

#[test]
fn persistent_globals_survive_across_runs() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("proj.strand-settings");

  let first = run_once(RuntimeSettings::load(path.clone()));
  assert_eq!(first, Value::Int(1));

  // The second run starts from the persisted value, not the declared one.
  let second = run_once(RuntimeSettings::load(path));
  assert_eq!(second, Value::Int(2));
}
