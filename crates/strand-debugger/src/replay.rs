//! Offline replay of a captured debug bundle.
//!
//! A replay session is read-only: it exposes the captured component
//! metadata, breakpoints, and watches, while every scheduler and debugger
//! operation is a no-op. The only way out is back to a live session,
//! seeding a fresh runtime with the captured state.

use std::path::Path;

use tracing::debug;

use strand_runtime::{ExecutionNotifier, Runtime, StepMode};

use crate::bundle::{BreakpointEntry, ComponentMetadata, DebugBundle, load_debug_bundle};
use crate::error::BundleError;
use crate::watch::WatchList;

/// A read-only runtime backed by a debug bundle.
pub struct ReplayRuntime {
  bundle: DebugBundle,
}

impl ReplayRuntime {
  /// Load a bundle from disk. On any failure nothing is committed and the
  /// error goes straight back to the caller.
  pub fn load(path: &Path) -> Result<Self, BundleError> {
    Ok(Self {
      bundle: load_debug_bundle(path)?,
    })
  }

  pub fn bundle(&self) -> &DebugBundle {
    &self.bundle
  }

  pub fn breakpoints(&self) -> &[BreakpointEntry] {
    &self.bundle.breakpoints
  }

  pub fn watches(&self) -> &[String] {
    &self.bundle.watches
  }

  pub fn component_metadata(&self, component: &str) -> Option<&ComponentMetadata> {
    self.bundle.components.get(component)
  }

  // Scheduler and debugger operations are no-ops during replay.

  pub fn start(&mut self, _debug_active: bool) {
    debug!("replay session: start ignored");
  }

  pub fn stop(&mut self, _notify_user: bool) {
    debug!("replay session: stop ignored");
  }

  pub fn pause(&mut self) {
    debug!("replay session: pause ignored");
  }

  pub fn resume(&mut self) {
    debug!("replay session: resume ignored");
  }

  pub fn run_single_step(&mut self, _mode: StepMode) {
    debug!("replay session: single step ignored");
  }

  pub fn pump(&mut self) -> usize {
    0
  }

  /// Toggle back to a live session: seed a live runtime's breakpoint
  /// table and a watch list from the captured state.
  pub fn apply_to_live<N: ExecutionNotifier>(
    &self,
    runtime: &mut Runtime<N>,
    watches: &mut WatchList,
  ) {
    for entry in &self.bundle.breakpoints {
      runtime.add_breakpoint(&entry.component);
      if !entry.enabled {
        runtime.disable_breakpoint(&entry.component);
      }
    }
    for expression in &self.bundle.watches {
      watches.add(expression.clone());
    }
  }
}
