//! Graph validation: endpoint existence, pin compatibility, data cycles.

use std::sync::Arc;

use strand_flow::{
  Component, ComponentContext, ComponentDescriptor, ComponentRegistry, ConnectionLine, Execution,
  Flow, FlowProject, GraphError, PinDef, PinType, PropertyValue, SEQ_IN, SEQ_OUT, Value,
  validate_project,
};

fn registry_with(descriptors: Vec<ComponentDescriptor>) -> ComponentRegistry {
  let mut registry = ComponentRegistry::with_builtins();
  for descriptor in descriptors {
    registry.register(descriptor).expect("register descriptor");
  }
  registry
}

fn noop(kind: &str) -> ComponentDescriptor {
  ComponentDescriptor::new(
    kind,
    Arc::new(|_ctx: &mut dyn ComponentContext| Ok(Execution::Completed)),
  )
}

fn project(flow: Flow) -> FlowProject {
  FlowProject {
    name: "test".to_string(),
    roots: vec![flow.id.clone()],
    flows: vec![flow],
    globals: Vec::new(),
  }
}

#[test]
fn accepts_a_simple_sequence_chain() {
  let mut flow = Flow::new("main");
  flow.components.push(Component::new("a", "start"));
  flow.components.push(Component::new("b", "end"));
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "b", SEQ_IN));

  let registry = ComponentRegistry::with_builtins();
  validate_project(&project(flow), &registry).expect("valid project");
}

#[test]
fn rejects_unknown_component_kind() {
  let mut flow = Flow::new("main");
  flow.components.push(Component::new("a", "no-such-kind"));

  let registry = ComponentRegistry::with_builtins();
  let err = validate_project(&project(flow), &registry).unwrap_err();
  assert!(matches!(err, GraphError::UnknownKind { .. }));
}

#[test]
fn rejects_line_to_missing_component() {
  let mut flow = Flow::new("main");
  flow.components.push(Component::new("a", "start"));
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "ghost", SEQ_IN));

  let registry = ComponentRegistry::with_builtins();
  let err = validate_project(&project(flow), &registry).unwrap_err();
  assert!(matches!(err, GraphError::LineComponentNotFound { .. }));
}

#[test]
fn rejects_incompatible_pin_types() {
  let producer = noop("bool-producer").with_output(PinDef::new("out", PinType::Boolean));
  let consumer = noop("string-consumer").with_input(PinDef::new("in", PinType::String));
  let registry = registry_with(vec![producer, consumer]);

  let mut flow = Flow::new("main");
  flow.components.push(Component::new("p", "bool-producer"));
  flow.components.push(Component::new("c", "string-consumer"));
  flow
    .connection_lines
    .push(ConnectionLine::new("p", "out", "c", "in"));

  let err = validate_project(&project(flow), &registry).unwrap_err();
  assert!(matches!(err, GraphError::IncompatiblePins { .. }));
}

#[test]
fn accepts_integer_widening() {
  let producer = noop("i8-producer").with_output(PinDef::new("out", PinType::Int8));
  let consumer = noop("i64-consumer").with_input(PinDef::new("in", PinType::Int64));
  let registry = registry_with(vec![producer, consumer]);

  let mut flow = Flow::new("main");
  flow.components.push(Component::new("p", "i8-producer"));
  flow.components.push(Component::new("c", "i64-consumer"));
  flow
    .connection_lines
    .push(ConnectionLine::new("p", "out", "c", "in"));

  validate_project(&project(flow), &registry).expect("widening is allowed");
}

#[test]
fn rejects_sequence_wired_to_data_pin() {
  let consumer = noop("string-consumer").with_input(PinDef::new("in", PinType::String));
  let registry = registry_with(vec![consumer]);

  let mut flow = Flow::new("main");
  flow.components.push(Component::new("a", "start"));
  flow.components.push(Component::new("c", "string-consumer"));
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "c", "in"));

  let err = validate_project(&project(flow), &registry).unwrap_err();
  assert!(matches!(err, GraphError::SequenceToData { .. }));
}

#[test]
fn rejects_data_cycle_but_allows_sequence_loop() {
  let relay = noop("relay")
    .with_input(PinDef::new("in", PinType::Any))
    .with_output(PinDef::new("out", PinType::Any));
  let registry = registry_with(vec![relay]);

  // Data cycle: x.out -> y.in, y.out -> x.in
  let mut flow = Flow::new("cyclic");
  flow.components.push(Component::new("x", "relay"));
  flow.components.push(Component::new("y", "relay"));
  flow
    .connection_lines
    .push(ConnectionLine::new("x", "out", "y", "in"));
  flow
    .connection_lines
    .push(ConnectionLine::new("y", "out", "x", "in"));

  let err = validate_project(&project(flow), &registry).unwrap_err();
  assert!(matches!(err, GraphError::DataCycle(_)));

  // The same shape over sequence pins is allowed.
  let mut flow = Flow::new("looped");
  flow.components.push(Component::new("x", "relay"));
  flow.components.push(Component::new("y", "relay"));
  flow
    .connection_lines
    .push(ConnectionLine::new("x", SEQ_OUT, "y", SEQ_IN));
  flow
    .connection_lines
    .push(ConnectionLine::new("y", SEQ_OUT, "x", SEQ_IN));

  validate_project(&project(flow), &registry).expect("sequence loops are allowed");
}

#[test]
fn rejects_missing_root() {
  let flow = Flow::new("main");
  let mut proj = project(flow);
  proj.roots.push("missing".to_string());

  let registry = ComponentRegistry::with_builtins();
  let err = validate_project(&proj, &registry).unwrap_err();
  assert!(matches!(err, GraphError::RootNotFound(_)));
}

#[test]
fn project_json_roundtrip() {
  let mut flow = Flow::new("main");
  flow.components.push(
    Component::new("a", "eval")
      .with_property("expression", PropertyValue::Expression("1 + 1".to_string())),
  );
  flow.components.push(Component::new("b", "end"));
  flow
    .connection_lines
    .push(ConnectionLine::new("a", SEQ_OUT, "b", SEQ_IN));

  let proj = FlowProject {
    name: "roundtrip".to_string(),
    roots: vec!["main".to_string()],
    flows: vec![flow],
    globals: vec![strand_flow::VariableDef {
      name: "greeting".to_string(),
      value: Value::String("hello".to_string()),
      persistent: false,
    }],
  };

  let json = serde_json::to_string(&proj).expect("serialize");
  let parsed = FlowProject::from_json(&json).expect("parse");
  assert_eq!(parsed, proj);
}

#[test]
fn registry_rejects_duplicate_kind() {
  let mut registry = ComponentRegistry::new();
  registry.register(noop("once")).expect("first register");
  let err = registry.register(noop("once")).unwrap_err();
  assert!(matches!(err, GraphError::DuplicateKind(_)));
}
