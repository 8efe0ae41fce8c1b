//! Debug bundle I/O.
//!
//! A bundle is a single-entry compressed archive: a UTF-8 JSON document,
//! gzip-compressed, carrying component metadata plus the recorded
//! breakpoints and watches. It backs the offline replay runtime.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::info;

use strand_runtime::{ExecutionNotifier, Runtime};

use crate::error::BundleError;
use crate::watch::WatchList;

/// Payload format version; bump on incompatible changes.
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
  pub kind: String,
  pub flow: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointEntry {
  pub component: String,
  pub enabled: bool,
}

/// The captured debug information of one runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugBundle {
  pub version: u32,
  /// component id → metadata
  pub components: BTreeMap<String, ComponentMetadata>,
  pub breakpoints: Vec<BreakpointEntry>,
  pub watches: Vec<String>,
}

impl DebugBundle {
  /// Capture the current session: the project's component metadata, the
  /// runtime's breakpoint table, and the watch list.
  pub fn capture<N: ExecutionNotifier>(runtime: &Runtime<N>, watches: &WatchList) -> Self {
    let mut components = BTreeMap::new();
    for flow in &runtime.project().flows {
      for component in &flow.components {
        components.insert(
          component.id.clone(),
          ComponentMetadata {
            kind: component.kind.clone(),
            flow: flow.id.clone(),
          },
        );
      }
    }

    let mut breakpoints: Vec<BreakpointEntry> = runtime
      .breakpoints()
      .map(|(component, breakpoint)| BreakpointEntry {
        component: component.to_string(),
        enabled: breakpoint.enabled,
      })
      .collect();
    breakpoints.sort_by(|a, b| a.component.cmp(&b.component));

    Self {
      version: BUNDLE_VERSION,
      components,
      breakpoints,
      watches: watches.iter().map(|watch| watch.expression.clone()).collect(),
    }
  }
}

/// Write a bundle as a gzip-compressed JSON document.
pub fn save_debug_bundle(path: &Path, bundle: &DebugBundle) -> Result<(), BundleError> {
  let save_err = |message: String| BundleError::Save {
    path: path.display().to_string(),
    message,
  };

  let json = serde_json::to_vec(bundle).map_err(|e| save_err(e.to_string()))?;
  let file = std::fs::File::create(path).map_err(|e| save_err(e.to_string()))?;
  let mut encoder = GzEncoder::new(file, Compression::best());
  encoder
    .write_all(&json)
    .map_err(|e| save_err(e.to_string()))?;
  encoder.finish().map_err(|e| save_err(e.to_string()))?;

  info!(path = %path.display(), "debug bundle saved");
  Ok(())
}

/// Read and decompress a bundle.
///
/// Fails without committing anything: an unreachable file, a non-gzip
/// payload, bad JSON, or an unsupported version all come back as errors
/// and leave no partial state behind.
pub fn load_debug_bundle(path: &Path) -> Result<DebugBundle, BundleError> {
  let file = std::fs::File::open(path).map_err(|source| BundleError::Unreachable {
    path: path.display().to_string(),
    source,
  })?;

  let mut decoder = GzDecoder::new(file);
  let mut json = String::new();
  decoder
    .read_to_string(&mut json)
    .map_err(|e| BundleError::Malformed {
      message: e.to_string(),
    })?;

  let bundle: DebugBundle = serde_json::from_str(&json).map_err(|e| BundleError::Malformed {
    message: e.to_string(),
  })?;

  if bundle.version != BUNDLE_VERSION {
    return Err(BundleError::UnsupportedVersion(bundle.version));
  }

  info!(path = %path.display(), "debug bundle loaded");
  Ok(bundle)
}
