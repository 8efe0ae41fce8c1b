//! Strand Bridge
//!
//! This crate is the seam between the interpreter and the compiled flow
//! engine that runs on (or is simulated for) the target device. The two
//! backends are functionally equivalent; the compiled one represents its
//! execution state as opaque integer handles, so the bridge maintains a
//! per-engine-instance handle table mapping those handles to
//! interpreter-side objects and back.

mod engine;
mod error;
mod handle_table;

pub use engine::{EngineInstanceId, Frame, NativeEngine};
pub use error::BridgeError;
pub use handle_table::{BridgeStateStore, HandleTable, NativeState, StateHandle};
