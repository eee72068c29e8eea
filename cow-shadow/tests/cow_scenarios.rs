//! End-to-end copy-on-write simulation scenarios.

#![cfg(not(loom))]

use std::sync::Arc;
use std::thread;

use cow_shadow::{
    Access, CopyOnWriteSimulator, Divergence, Instrumentation, ShadowStorageHost, Storage,
    StorageImpl, View,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn shadow_stays_behind_after_three_storage_writes() {
    init_tracing();

    let mut storage = Storage::new(256);
    let simulator = storage.simulate_copy_on_write(None);
    assert_eq!(simulator.storage_generation(), 0);

    let shadow = simulator.new_shadow_storage();
    assert_eq!(shadow.generation(), 0);

    for _ in 0..3 {
        storage.maybe_bump_copy_on_write_generation(Some(&simulator));
    }

    assert_eq!(simulator.storage_generation(), 3);
    assert_eq!(shadow.generation(), 0);
    assert!(shadow.generation() < simulator.storage_generation());
    assert_eq!(
        simulator.check_generation(&shadow),
        Divergence::Stale { shadow: 0, live: 3 }
    );
}

#[test]
fn storage_handles_share_one_simulator() {
    let storage = Storage::new(64);
    let mut writer = storage.clone();

    let simulator = storage.simulate_copy_on_write(None);
    writer.maybe_bump_copy_on_write_generation(None);

    assert!(Arc::ptr_eq(
        &simulator,
        &writer.copy_on_write_simulator().unwrap()
    ));
    assert_eq!(simulator.storage_generation(), 1);
    assert_eq!(storage.use_count(), 2);
}

#[test]
fn lineages_diverge_and_aliases_follow_their_source() {
    init_tracing();

    let storage = Storage::new(1024);
    let mut original = View::new(storage.clone(), Instrumentation::Enabled);
    let mut clone = original.simulate_lazy_clone();
    let original_alias = original.alias();

    // Writes through the original lineage.
    original.record_write();
    original.record_write();

    assert_eq!(
        original_alias.check_access(),
        Access::Tracked(Divergence::InSync)
    );
    assert_eq!(
        clone.check_access(),
        Access::Tracked(Divergence::Stale { shadow: 0, live: 2 })
    );

    // Writing through the stale clone is reported and diverges both sides.
    assert!(clone.record_write().has_diverged());
    assert!(original.check_access().has_diverged());
    assert_eq!(storage.generation(), 3);
    assert_eq!(clone.shadow_storage().map(|s| s.generation()), Some(1));
}

#[test]
fn disabled_instrumentation_keeps_views_stateless() {
    let storage = Storage::new(8);
    let mut view = View::new(storage, Instrumentation::Disabled);
    let clone = view.simulate_lazy_clone();

    assert!(view.shadow_storage().is_none());
    assert!(clone.shadow_storage_ref().is_none());
    assert_eq!(view.record_write(), Access::Untracked);
    assert_eq!(clone.check_access(), Access::Untracked);
}

#[test]
fn storage_created_mid_lineage_starts_simulation_there() {
    let storage = Storage::from_impl(Arc::new(StorageImpl::with_generation(8, 40)));
    let view = View::new(storage.clone(), Instrumentation::Enabled);
    assert_eq!(view.check_access(), Access::Untracked);

    let simulator = storage.simulate_copy_on_write(None);
    assert_eq!(simulator.storage_generation(), 40);

    let late = View::new(storage, Instrumentation::Enabled);
    assert_eq!(late.shadow_storage().unwrap().generation(), 40);
}

#[test]
fn concurrent_writers_bump_every_write_once() {
    let storage = Storage::new(4096);
    let simulator = storage.simulate_copy_on_write(None);
    let shadow = simulator.new_shadow_storage();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mut writer = storage.clone();
            let simulator = Arc::clone(&simulator);
            thread::spawn(move || {
                for _ in 0..500 {
                    writer.maybe_bump_copy_on_write_generation(Some(&simulator));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(simulator.storage_generation(), 2000);
    assert_eq!(storage.generation(), 2000);
    assert_eq!(
        simulator.check_generation(&shadow),
        Divergence::Stale {
            shadow: 0,
            live: 2000
        }
    );
}

#[test]
fn simulator_supplied_by_caller_is_adopted() {
    let storage = Storage::new(8);
    let supplied = CopyOnWriteSimulator::new_shared(0);

    let attached = storage.simulate_copy_on_write(Some(&supplied));
    assert!(Arc::ptr_eq(&attached, &supplied));

    let view = View::new(storage, Instrumentation::Enabled);
    assert!(Arc::ptr_eq(&view.simulator().unwrap(), &supplied));
}

#[cfg(not(feature = "abort-on-violation"))]
mod fatal {
    use super::*;

    #[test]
    #[should_panic(expected = "storage has no backing implementation")]
    fn simulate_on_null_storage() {
        let storage: Storage = Storage::default();
        let _ = storage.simulate_copy_on_write(None);
    }

    #[test]
    #[should_panic(expected = "storage has no backing implementation")]
    fn maybe_bump_on_null_storage() {
        let mut storage: Storage = Storage::default();
        storage.maybe_bump_copy_on_write_generation(None);
    }

    #[test]
    #[should_panic(expected = "storage has no backing implementation")]
    fn view_over_null_storage() {
        let _ = View::new(Storage::<StorageImpl>::null(), Instrumentation::Enabled);
    }

    #[test]
    #[should_panic(expected = "storage has no backing implementation")]
    fn untracked_view_over_null_storage() {
        let _ = View::new(Storage::<StorageImpl>::null(), Instrumentation::Disabled);
    }

    #[test]
    #[should_panic(expected = "generation counter exhausted")]
    fn storage_write_at_exhausted_generation() {
        let mut storage = Storage::from_impl(Arc::new(StorageImpl::with_generation(8, u64::MAX)));
        storage.maybe_bump_copy_on_write_generation(None);
    }
}
