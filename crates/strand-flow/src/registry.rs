//! Component descriptor registry.
//!
//! A component's `kind` string selects a descriptor: its pin schema plus
//! its execute behavior. The registry is an explicit object built at
//! process start and injected into each runtime; there is no ambient
//! global table of component kinds.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use strand_bridge::NativeState;

use crate::context::{ComponentContext, ComponentError, Execution};
use crate::error::GraphError;
use crate::pin::{PinDef, PinType};
use crate::value::Value;

pub type ExecuteFn =
  Arc<dyn Fn(&mut dyn ComponentContext) -> Result<Execution, ComponentError> + Send + Sync>;

/// Called with (flow state id, component id) when a suspended invocation
/// is torn down before its completion arrived.
pub type AbortFn = Arc<dyn Fn(Uuid, &str) + Send + Sync>;

/// Everything the scheduler knows about one component kind.
pub struct ComponentDescriptor {
  pub kind: String,
  /// Declared data inputs. Every component additionally accepts the
  /// implicit `@seqin` sequence input.
  pub inputs: Vec<PinDef>,
  /// Declared data outputs, plus the implicit `@seqout`.
  pub outputs: Vec<PinDef>,
  pub execute: ExecuteFn,
  pub abort: Option<AbortFn>,
}

impl ComponentDescriptor {
  pub fn new(kind: impl Into<String>, execute: ExecuteFn) -> Self {
    Self {
      kind: kind.into(),
      inputs: Vec::new(),
      outputs: Vec::new(),
      execute,
      abort: None,
    }
  }

  pub fn with_input(mut self, pin: PinDef) -> Self {
    self.inputs.push(pin);
    self
  }

  pub fn with_output(mut self, pin: PinDef) -> Self {
    self.outputs.push(pin);
    self
  }

  pub fn with_abort(mut self, abort: AbortFn) -> Self {
    self.abort = Some(abort);
    self
  }

  pub fn input(&self, name: &str) -> Option<&PinDef> {
    self.inputs.iter().find(|p| p.name == name)
  }

  pub fn output(&self, name: &str) -> Option<&PinDef> {
    self.outputs.iter().find(|p| p.name == name)
  }
}

/// Component-kind → descriptor map, resolved once at graph load.
#[derive(Default)]
pub struct ComponentRegistry {
  descriptors: HashMap<String, Arc<ComponentDescriptor>>,
}

impl ComponentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry pre-populated with the built-in component kinds.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    for descriptor in builtins() {
      // Builtin kinds are distinct by construction.
      let _ = registry.register(descriptor);
    }
    registry
  }

  pub fn register(&mut self, descriptor: ComponentDescriptor) -> Result<(), GraphError> {
    if self.descriptors.contains_key(&descriptor.kind) {
      return Err(GraphError::DuplicateKind(descriptor.kind));
    }
    self
      .descriptors
      .insert(descriptor.kind.clone(), Arc::new(descriptor));
    Ok(())
  }

  pub fn get(&self, kind: &str) -> Option<Arc<ComponentDescriptor>> {
    self.descriptors.get(kind).cloned()
  }

  pub fn contains(&self, kind: &str) -> bool {
    self.descriptors.contains_key(kind)
  }

  pub fn kinds(&self) -> impl Iterator<Item = &str> {
    self.descriptors.keys().map(String::as_str)
  }
}

/// Interpreter-side state a `native` component keeps registered with the
/// compiled backend. Nothing to free on this side; the entry itself is
/// what the engine's handles point at.
struct NativeComponentState;

impl NativeState for NativeComponentState {
  fn cleanup(&self) {}
}

fn builtins() -> Vec<ComponentDescriptor> {
  vec![
    // Fires the sequence output once; seeds a flow's control chain.
    ComponentDescriptor::new(
      "start",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    ),
    // Terminates a control chain.
    ComponentDescriptor::new(
      "end",
      Arc::new(|_ctx: &mut dyn ComponentContext| Ok(Execution::Completed)),
    ),
    // Evaluates the `expression` property and propagates the result.
    ComponentDescriptor::new(
      "eval",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        let value = ctx.eval_property("expression")?;
        ctx.propagate("result", value);
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    )
    .with_output(PinDef::new("result", PinType::Any)),
    // Logs the evaluated `message` property.
    ComponentDescriptor::new(
      "log",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        let message = ctx.eval_property("message")?;
        ctx.log(&message.to_string());
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    ),
    // Assigns the evaluated `value` property to the `variable` target.
    ComponentDescriptor::new(
      "set-variable",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        let target = match ctx.eval_property("variable")? {
          Value::String(name) => name,
          other => return Err(ComponentError::mistyped_property("variable", "string", &other)),
        };
        let value = ctx.eval_property("value")?;
        ctx.assign(&target, value)?;
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    ),
    // Spawns a nested flow state for the `flow` property.
    ComponentDescriptor::new(
      "call-flow",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        let flow = match ctx.eval_property("flow")? {
          Value::String(id) => id,
          other => return Err(ComponentError::mistyped_property("flow", "string", &other)),
        };
        ctx.spawn_flow(&flow, None)?;
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    ),
    // Spawns `count` per-item instances of the `flow` property, binding
    // `index` in each.
    ComponentDescriptor::new(
      "repeat",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        let flow = match ctx.eval_property("flow")? {
          Value::String(id) => id,
          other => return Err(ComponentError::mistyped_property("flow", "string", &other)),
        };
        let count = ctx
          .eval_property_with_type("count", PinType::Int64)?
          .as_int()
          .unwrap_or(0);
        for index in 0..count {
          ctx.spawn_flow(&flow, Some(index))?;
        }
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    ),
    // Suspends for `milliseconds`, then continues through the sequence
    // output. Requires a tokio runtime on the driving thread.
    ComponentDescriptor::new(
      "delay",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        let millis = ctx
          .eval_property_with_type("milliseconds", PinType::Int64)?
          .as_int()
          .unwrap_or(0)
          .max(0) as u64;
        let handle = ctx.async_handle();
        tokio::spawn(async move {
          tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
          handle.complete();
        });
        Ok(Execution::Suspended)
      }),
    ),
    // Marker for a future local-recovery hook; currently passes the
    // sequence signal through.
    ComponentDescriptor::new(
      "catch-error",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    ),
    // Delegates one tick to the compiled backend, keeping a state entry
    // registered in the handle table for the lifetime of the flow state.
    ComponentDescriptor::new(
      "native",
      Arc::new(|ctx: &mut dyn ComponentContext| {
        if !ctx.has_native_state() {
          ctx.register_native_state(Arc::new(NativeComponentState))?;
        }
        match ctx.native_engine() {
          Some(engine) => engine
            .tick()
            .map_err(|e| ComponentError::Failed(e.to_string()))?,
          None => {
            return Err(ComponentError::Failed(
              "no native engine attached to this runtime".to_string(),
            ));
          }
        }
        ctx.propagate_seqout();
        Ok(Execution::Completed)
      }),
    ),
  ]
}
