//! Graph validation.
//!
//! Everything the scheduler is allowed to assume about a project is
//! checked here, once, at load time: line endpoints exist, pin types are
//! compatible, and the data-pin subgraph is acyclic. Type checks never
//! happen again at run time.

use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::flow::{Flow, FlowProject};
use crate::pin::{PinType, SEQ_IN, SEQ_OUT};
use crate::registry::ComponentRegistry;

/// Validate a project against a registry.
pub fn validate_project(
  project: &FlowProject,
  registry: &ComponentRegistry,
) -> Result<(), GraphError> {
  let mut flow_ids = HashSet::new();
  for flow in &project.flows {
    if !flow_ids.insert(flow.id.as_str()) {
      return Err(GraphError::DuplicateFlow(flow.id.clone()));
    }
  }

  for root in &project.roots {
    if project.get_flow(root).is_none() {
      return Err(GraphError::RootNotFound(root.clone()));
    }
  }

  for flow in &project.flows {
    validate_flow(flow, registry)?;
  }

  Ok(())
}

fn validate_flow(flow: &Flow, registry: &ComponentRegistry) -> Result<(), GraphError> {
  let mut seen = HashSet::new();
  for component in &flow.components {
    if !seen.insert(component.id.as_str()) {
      return Err(GraphError::DuplicateComponent {
        flow: flow.id.clone(),
        component: component.id.clone(),
      });
    }
    if !registry.contains(&component.kind) {
      return Err(GraphError::UnknownKind {
        flow: flow.id.clone(),
        component: component.id.clone(),
        kind: component.kind.clone(),
      });
    }
  }

  for line in &flow.connection_lines {
    let source = flow.get_component(&line.source).ok_or_else(|| {
      GraphError::LineComponentNotFound {
        flow: flow.id.clone(),
        component: line.source.clone(),
      }
    })?;
    let target = flow.get_component(&line.target).ok_or_else(|| {
      GraphError::LineComponentNotFound {
        flow: flow.id.clone(),
        component: line.target.clone(),
      }
    })?;

    let source_desc = registry.get(&source.kind).ok_or_else(|| GraphError::UnknownKind {
      flow: flow.id.clone(),
      component: source.id.clone(),
      kind: source.kind.clone(),
    })?;
    let target_desc = registry.get(&target.kind).ok_or_else(|| GraphError::UnknownKind {
      flow: flow.id.clone(),
      component: target.id.clone(),
      kind: target.kind.clone(),
    })?;

    let source_seq = line.output == SEQ_OUT;
    let target_seq = line.input == SEQ_IN;

    if source_seq != target_seq {
      return Err(GraphError::SequenceToData {
        flow: flow.id.clone(),
        source_component: line.source.clone(),
        output: line.output.clone(),
        target: line.target.clone(),
        input: line.input.clone(),
      });
    }
    if source_seq {
      continue;
    }

    let output_ty = pin_type(
      source_desc.output(&line.output).map(|p| p.ty),
      flow,
      &line.source,
      &line.output,
    )?;
    let input_ty = pin_type(
      target_desc.input(&line.input).map(|p| p.ty),
      flow,
      &line.target,
      &line.input,
    )?;

    if !output_ty.flows_into(input_ty) {
      return Err(GraphError::IncompatiblePins {
        flow: flow.id.clone(),
        source_component: line.source.clone(),
        output: line.output.clone(),
        source_type: format!("{:?}", output_ty),
        target_component: line.target.clone(),
        input: line.input.clone(),
        target_type: format!("{:?}", input_ty),
      });
    }
  }

  check_data_cycles(flow)?;

  Ok(())
}

fn pin_type(
  ty: Option<PinType>,
  flow: &Flow,
  component: &str,
  pin: &str,
) -> Result<PinType, GraphError> {
  ty.ok_or_else(|| GraphError::PinNotFound {
    flow: flow.id.clone(),
    component: component.to_string(),
    pin: pin.to_string(),
  })
}

/// Reject cycles over data pins. Sequence wires may loop (that is how
/// authored repeat-until chains work); data dependencies may not.
fn check_data_cycles(flow: &Flow) -> Result<(), GraphError> {
  let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
  for line in &flow.connection_lines {
    if line.output != SEQ_OUT {
      adjacency
        .entry(line.source.as_str())
        .or_default()
        .push(line.target.as_str());
    }
  }

  #[derive(Clone, Copy, PartialEq)]
  enum Mark {
    Visiting,
    Done,
  }

  fn visit<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
  ) -> bool {
    match marks.get(node) {
      Some(Mark::Done) => return true,
      Some(Mark::Visiting) => return false,
      None => {}
    }
    marks.insert(node, Mark::Visiting);
    if let Some(next) = adjacency.get(node) {
      for target in next {
        if !visit(target, adjacency, marks) {
          return false;
        }
      }
    }
    marks.insert(node, Mark::Done);
    true
  }

  let mut marks = HashMap::new();
  for component in &flow.components {
    if !visit(component.id.as_str(), &adjacency, &mut marks) {
      return Err(GraphError::DataCycle(flow.id.clone()));
    }
  }

  Ok(())
}
