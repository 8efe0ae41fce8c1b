//! Execution-state handle table.
//!
//! The compiled backend refers to interpreter-side component state through
//! opaque integer handles. Each engine instance gets its own table with O(1)
//! lookup in both directions. Slots carry a generation counter, so a handle
//! that outlives its registration misses instead of aliasing whatever object
//! reused the slot.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::EngineInstanceId;

/// Interpreter-side state registered with the compiled backend.
///
/// `cleanup` runs exactly once, when the entry is released.
pub trait NativeState: Send + Sync {
  fn cleanup(&self);
}

/// Opaque handle to one registered state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateHandle {
  index: u32,
  generation: u32,
}

impl StateHandle {
  /// Pack into the single integer exchanged with the engine.
  pub fn as_raw(self) -> u64 {
    (u64::from(self.generation) << 32) | u64::from(self.index)
  }

  pub fn from_raw(raw: u64) -> Self {
    Self {
      index: (raw & 0xffff_ffff) as u32,
      generation: (raw >> 32) as u32,
    }
  }
}

struct Slot {
  generation: u32,
  entry: Option<Arc<dyn NativeState>>,
}

/// Bidirectional handle ↔ object map for one engine instance.
#[derive(Default)]
pub struct HandleTable {
  slots: Vec<Slot>,
  free: Vec<u32>,
  by_object: HashMap<usize, StateHandle>,
}

fn object_key(object: &Arc<dyn NativeState>) -> usize {
  Arc::as_ptr(object) as *const () as usize
}

impl HandleTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register an object and return its handle.
  ///
  /// Registering an object that is already present returns the existing
  /// handle instead of creating a second mapping for it.
  pub fn register_state(&mut self, object: Arc<dyn NativeState>) -> StateHandle {
    let key = object_key(&object);
    if let Some(handle) = self.by_object.get(&key) {
      return *handle;
    }

    let handle = match self.free.pop() {
      Some(index) => {
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(object);
        StateHandle {
          index,
          generation: slot.generation,
        }
      }
      None => {
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
          generation: 0,
          entry: Some(object),
        });
        StateHandle {
          index,
          generation: 0,
        }
      }
    };

    self.by_object.insert(key, handle);
    handle
  }

  /// Look up the object behind a handle. A stale handle returns `None`.
  pub fn object_for_handle(&self, handle: StateHandle) -> Option<Arc<dyn NativeState>> {
    let slot = self.slots.get(handle.index as usize)?;
    if slot.generation != handle.generation {
      return None;
    }
    slot.entry.clone()
  }

  pub fn handle_for_object(&self, object: &Arc<dyn NativeState>) -> Option<StateHandle> {
    self.by_object.get(&object_key(object)).copied()
  }

  /// Release one entry, running its cleanup hook.
  ///
  /// Idempotent: releasing a stale or already-released handle is a no-op.
  /// Returns whether an entry was actually released.
  pub fn release_state(&mut self, handle: StateHandle) -> bool {
    let Some(slot) = self.slots.get_mut(handle.index as usize) else {
      return false;
    };
    if slot.generation != handle.generation {
      return false;
    }
    let Some(object) = slot.entry.take() else {
      return false;
    };

    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(handle.index);
    self.by_object.remove(&object_key(&object));
    object.cleanup();
    true
  }

  /// Release every entry, running each cleanup hook exactly once.
  pub fn release_all_states(&mut self) {
    for (index, slot) in self.slots.iter_mut().enumerate() {
      if let Some(object) = slot.entry.take() {
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index as u32);
        self.by_object.remove(&object_key(&object));
        object.cleanup();
      }
    }
  }

  pub fn len(&self) -> usize {
    self.by_object.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_object.is_empty()
  }
}

/// Handle tables for every open engine instance, keyed by instance id.
#[derive(Default)]
pub struct BridgeStateStore {
  tables: HashMap<EngineInstanceId, HandleTable>,
}

impl BridgeStateStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_state(
    &mut self,
    engine: EngineInstanceId,
    object: Arc<dyn NativeState>,
  ) -> StateHandle {
    self.tables.entry(engine).or_default().register_state(object)
  }

  pub fn object_for_handle(
    &self,
    engine: EngineInstanceId,
    handle: StateHandle,
  ) -> Option<Arc<dyn NativeState>> {
    self.tables.get(&engine)?.object_for_handle(handle)
  }

  pub fn handle_for_object(
    &self,
    engine: EngineInstanceId,
    object: &Arc<dyn NativeState>,
  ) -> Option<StateHandle> {
    self.tables.get(&engine)?.handle_for_object(object)
  }

  pub fn release_state(&mut self, engine: EngineInstanceId, handle: StateHandle) -> bool {
    match self.tables.get_mut(&engine) {
      Some(table) => table.release_state(handle),
      None => {
        warn!(%engine, "release_state for unknown engine instance");
        false
      }
    }
  }

  /// Flush one engine instance's table entirely.
  pub fn release_all_states(&mut self, engine: EngineInstanceId) {
    if let Some(table) = self.tables.get_mut(&engine) {
      table.release_all_states();
    }
  }

  pub fn registered_count(&self, engine: EngineInstanceId) -> usize {
    self.tables.get(&engine).map_or(0, HandleTable::len)
  }
}
