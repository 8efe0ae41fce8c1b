//! Strand Flow
//!
//! The static flow-graph model: flows, components, connection lines, pin
//! types, the component-descriptor registry, and graph validation. A
//! project validated by this crate is immutable for the lifetime of a
//! runtime; the scheduler in `strand-runtime` executes it without any
//! type-specific branching.

mod component;
mod context;
mod error;
mod flow;
mod pin;
mod registry;
mod validate;
mod value;

pub use component::{Component, PropertyValue};
pub use context::{
  AsyncHandle, ComponentContext, ComponentError, Completion, CompletionOutcome, Execution,
};
pub use error::GraphError;
pub use flow::{ConnectionLine, Flow, FlowProject, VariableDef};
pub use pin::{PinDef, PinType, SEQ_IN, SEQ_OUT};
pub use registry::{AbortFn, ComponentDescriptor, ComponentRegistry, ExecuteFn};
pub use validate::validate_project;
pub use value::Value;
