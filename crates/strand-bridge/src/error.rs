//! Bridge error types.

use thiserror::Error;

use crate::EngineInstanceId;

/// Errors raised by calls into the compiled backend.
#[derive(Debug, Error)]
pub enum BridgeError {
  /// Engine initialization failed (bad asset image, allocation failure, ...).
  #[error("engine init failed: {message}")]
  Init { message: String },

  /// An engine entry point returned a failure.
  #[error("engine call '{entry_point}' failed: {message}")]
  Call {
    entry_point: &'static str,
    message: String,
  },

  /// The engine returned data the bridge could not decode.
  #[error("malformed data from engine: {message}")]
  MalformedData { message: String },

  /// No handle table exists for the given engine instance.
  #[error("unknown engine instance: {0}")]
  UnknownInstance(EngineInstanceId),
}
