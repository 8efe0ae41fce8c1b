//! Entry points of the compiled flow engine.
//!
//! The compiled backend is functionally equivalent to the interpreter but
//! keeps its execution state on its own side of the process boundary and
//! refers to interpreter-side objects only through the handle table.

use std::fmt;

use crate::error::BridgeError;

/// Identifies one running engine instance.
///
/// Handle tables are keyed by this id so that two concurrently open
/// compiled-engine instances can never observe each other's handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineInstanceId(pub u32);

impl fmt::Display for EngineInstanceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "engine-{}", self.0)
  }
}

/// One rendered frame fetched from the engine.
#[derive(Debug, Clone)]
pub struct Frame {
  pub width: u32,
  pub height: u32,
  /// RGBA, row-major, `width * height * 4` bytes.
  pub pixels: Vec<u8>,
}

/// The fixed set of entry points exposed by the compiled backend.
///
/// `init` receives the serialized asset image produced by the external
/// build pipeline. All other calls are only valid after a successful init.
pub trait NativeEngine: Send {
  fn init(&mut self, assets: &[u8]) -> Result<(), BridgeError>;

  /// Advance the engine by one tick.
  fn tick(&mut self) -> Result<(), BridgeError>;

  fn pointer_event(&mut self, x: i32, y: i32, pressed: bool) -> Result<(), BridgeError>;

  fn wheel_event(&mut self, delta_y: i32, clicked: bool) -> Result<(), BridgeError>;

  /// Feed one debugger protocol message to the engine.
  fn message_from_debugger(&mut self, data: &[u8]) -> Result<(), BridgeError>;

  /// Drain messages the engine queued for the debugger.
  fn messages_to_debugger(&mut self) -> Result<Vec<Vec<u8>>, BridgeError>;

  /// Fetch the most recent rendered frame, if the engine produced one.
  fn rendered_frame(&mut self) -> Result<Option<Frame>, BridgeError>;
}
