//! Strand Debugger
//!
//! The debugger layer on top of `strand-runtime`: watch expressions, the
//! read-only active-flows view, debug bundle capture/load, and the offline
//! replay session. The breakpoint table and single-step modes live on the
//! runtime itself, where the scheduler consults them; this crate adds the
//! pieces a debugger UI needs around them.

mod bundle;
mod error;
mod replay;
mod snapshot;
mod watch;

pub use bundle::{
  BUNDLE_VERSION, BreakpointEntry, ComponentMetadata, DebugBundle, load_debug_bundle,
  save_debug_bundle,
};
pub use error::BundleError;
pub use replay::ReplayRuntime;
pub use snapshot::{FlowStateSnapshot, active_flows};
pub use watch::{Watch, WatchEvaluation, WatchList, WatchOutcome};
