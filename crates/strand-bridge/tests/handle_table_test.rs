//! Handle table behavior: idempotent release, exactly-once cleanup, stale
//! handles missing instead of aliasing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strand_bridge::{BridgeStateStore, EngineInstanceId, HandleTable, NativeState, StateHandle};

struct CountingState {
  cleanups: Arc<AtomicUsize>,
}

impl NativeState for CountingState {
  fn cleanup(&self) {
    self.cleanups.fetch_add(1, Ordering::SeqCst);
  }
}

fn counting_state(cleanups: &Arc<AtomicUsize>) -> Arc<dyn NativeState> {
  Arc::new(CountingState {
    cleanups: cleanups.clone(),
  })
}

#[test]
fn lookup_works_in_both_directions() {
  let mut table = HandleTable::new();
  let cleanups = Arc::new(AtomicUsize::new(0));
  let object = counting_state(&cleanups);

  let handle = table.register_state(object.clone());

  assert!(table.object_for_handle(handle).is_some());
  assert_eq!(table.handle_for_object(&object), Some(handle));
}

#[test]
fn registering_same_object_twice_returns_existing_handle() {
  let mut table = HandleTable::new();
  let cleanups = Arc::new(AtomicUsize::new(0));
  let object = counting_state(&cleanups);

  let first = table.register_state(object.clone());
  let second = table.register_state(object.clone());

  assert_eq!(first, second);
  assert_eq!(table.len(), 1);
}

#[test]
fn release_is_idempotent_and_runs_cleanup_once() {
  let mut table = HandleTable::new();
  let cleanups = Arc::new(AtomicUsize::new(0));
  let handle = table.register_state(counting_state(&cleanups));

  assert!(table.release_state(handle));
  assert!(!table.release_state(handle));
  assert!(!table.release_state(handle));

  assert_eq!(cleanups.load(Ordering::SeqCst), 1);
  assert!(table.object_for_handle(handle).is_none());
}

#[test]
fn release_all_runs_each_cleanup_exactly_once() {
  let mut table = HandleTable::new();
  let cleanups = Arc::new(AtomicUsize::new(0));
  for _ in 0..5 {
    table.register_state(counting_state(&cleanups));
  }

  table.release_all_states();
  table.release_all_states();

  assert_eq!(cleanups.load(Ordering::SeqCst), 5);
  assert!(table.is_empty());
}

#[test]
fn stale_handle_does_not_alias_reused_slot() {
  let mut table = HandleTable::new();
  let cleanups = Arc::new(AtomicUsize::new(0));

  let old = table.register_state(counting_state(&cleanups));
  table.release_state(old);

  // The freed slot is reused with a bumped generation.
  let new = table.register_state(counting_state(&cleanups));
  assert_ne!(old, new);

  assert!(table.object_for_handle(old).is_none());
  assert!(table.object_for_handle(new).is_some());

  // Releasing through the stale handle must not touch the new occupant.
  assert!(!table.release_state(old));
  assert!(table.object_for_handle(new).is_some());
}

#[test]
fn raw_roundtrip_preserves_generation() {
  let mut table = HandleTable::new();
  let cleanups = Arc::new(AtomicUsize::new(0));

  let first = table.register_state(counting_state(&cleanups));
  table.release_state(first);
  let second = table.register_state(counting_state(&cleanups));

  let roundtripped = StateHandle::from_raw(second.as_raw());
  assert_eq!(roundtripped, second);
  assert!(table.object_for_handle(roundtripped).is_some());
  assert!(table.object_for_handle(StateHandle::from_raw(first.as_raw())).is_none());
}

#[test]
fn store_keeps_engine_instances_separate() {
  let mut store = BridgeStateStore::new();
  let cleanups = Arc::new(AtomicUsize::new(0));
  let a = EngineInstanceId(1);
  let b = EngineInstanceId(2);

  let handle_a = store.register_state(a, counting_state(&cleanups));
  let handle_b = store.register_state(b, counting_state(&cleanups));

  assert!(store.object_for_handle(a, handle_a).is_some());
  assert!(store.object_for_handle(b, handle_b).is_some());

  store.release_all_states(a);

  assert!(store.object_for_handle(a, handle_a).is_none());
  assert!(store.object_for_handle(b, handle_b).is_some());
  assert_eq!(cleanups.load(Ordering::SeqCst), 1);
  assert_eq!(store.registered_count(a), 0);
  assert_eq!(store.registered_count(b), 1);
}
