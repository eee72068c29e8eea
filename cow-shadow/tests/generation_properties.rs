//! Property tests for generation counters and shadow-storage mixins.
//!
//! Shared and exclusive counters run the same counting code; these tests
//! check that both policies agree on every sequence of bumps and that the
//! mixin gating holds for arbitrary inputs.

#![cfg(not(loom))]

use cow_shadow::generation::{
    ExclusiveGenerationCounter, SharedGenerationCounter, MAX_GENERATION,
};
use cow_shadow::{Instrumentation, ShadowStorage, ShadowStorageMixin};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_n_bumps_from_g_reach_g_plus_n(
        initial in 0u64..=(MAX_GENERATION - 512),
        bumps in 0usize..512,
    ) {
        let counter = SharedGenerationCounter::new(initial);

        for index in 0..bumps {
            let returned = counter.bump_generation();
            prop_assert_eq!(returned, initial + index as u64 + 1);
        }

        prop_assert_eq!(counter.generation(), initial + bumps as u64);
    }

    #[test]
    fn prop_bumps_near_the_top_stop_exactly_at_max(distance in 0u64..64) {
        let counter = ExclusiveGenerationCounter::new(MAX_GENERATION - distance);

        for _ in 0..distance {
            counter.bump_generation();
        }

        prop_assert_eq!(counter.generation(), MAX_GENERATION);
        prop_assert!(counter.is_exhausted());
    }

    #[test]
    fn prop_shared_and_exclusive_policies_agree(
        initial in 0u64..=(MAX_GENERATION - 256),
        bumps in 0usize..256,
    ) {
        let shared = SharedGenerationCounter::new(initial);
        let exclusive = ExclusiveGenerationCounter::new(initial);

        prop_assert_eq!(shared.generation(), exclusive.generation());
        for _ in 0..bumps {
            prop_assert_eq!(shared.bump_generation(), exclusive.bump_generation());
            prop_assert_eq!(shared.generation(), exclusive.generation());
        }
    }

    #[test]
    fn prop_disabled_mixin_is_always_empty(generation in any::<u64>(), supply in any::<bool>()) {
        let shadow = supply.then(|| ShadowStorage::new_shared(generation));
        let mixin = ShadowStorageMixin::with_instrumentation(shadow, Instrumentation::Disabled);

        prop_assert!(mixin.shadow_storage().is_none());
        prop_assert!(mixin.shadow_storage_ref().is_none());
    }

    #[test]
    fn prop_enabled_mixin_accessors_agree(generation in any::<u64>()) {
        let mixin = ShadowStorageMixin::with_instrumentation(
            Some(ShadowStorage::new_shared(generation)),
            Instrumentation::Enabled,
        );

        let borrowed = mixin.shadow_storage().expect("tracking mixin");
        let owned = mixin.shadow_storage_ref().expect("tracking mixin");
        prop_assert!(std::ptr::eq(borrowed, &*owned));
        prop_assert_eq!(borrowed.generation(), generation);
    }
}

#[cfg(not(feature = "abort-on-violation"))]
#[test]
fn bump_at_max_never_wraps() {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let shared = SharedGenerationCounter::new(MAX_GENERATION);
    let exclusive = ExclusiveGenerationCounter::new(MAX_GENERATION);

    assert!(catch_unwind(AssertUnwindSafe(|| shared.bump_generation())).is_err());
    assert!(catch_unwind(AssertUnwindSafe(|| exclusive.bump_generation())).is_err());

    assert_eq!(shared.generation(), MAX_GENERATION);
    assert_eq!(exclusive.generation(), MAX_GENERATION);
}
