//! Strand Runtime
//!
//! The execution half of strand: a cooperative single-threaded scheduler
//! pumped by the host, the flow-state tree with parent/child scoping, the
//! value-propagation protocol, breakpoints and single-stepping, the
//! expression-evaluation seam, and runtime settings persistence.
//!
//! One `Runtime` serves one open flow project. Multiple simultaneously
//! open projects get independent runtimes; no scheduler state is shared
//! between them.

mod error;
mod events;
mod expression;
mod queue;
mod runtime;
mod settings;
mod state;

pub use error::FlowError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use expression::{ExpressionEvaluator, JinjaEvaluator, coerce_value};
pub use queue::{LineRef, QueueTask, TaskSnapshot};
pub use runtime::{Breakpoint, RunState, Runtime, StepMode, StopReason};
pub use settings::{RuntimeSettings, SETTINGS_EXTENSION};
pub use state::{ComponentState, FlowState};
