//! Debug bundle errors.

use std::io;

use thiserror::Error;

/// Failures loading or saving a debug bundle.
///
/// These are returned directly to the caller; they never leave a runtime
/// in a started state and never commit partial debug info.
#[derive(Debug, Error)]
pub enum BundleError {
  /// The bundle file could not be opened.
  #[error("debug bundle unreachable: {path}")]
  Unreachable {
    path: String,
    #[source]
    source: io::Error,
  },

  /// The archive or its payload could not be decoded.
  #[error("malformed debug bundle: {message}")]
  Malformed { message: String },

  /// The payload declares a version this build does not understand.
  #[error("unsupported debug bundle version: {0}")]
  UnsupportedVersion(u32),

  /// Writing the bundle failed.
  #[error("failed to write debug bundle '{path}': {message}")]
  Save { path: String, message: String },
}
