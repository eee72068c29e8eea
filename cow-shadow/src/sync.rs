//! Conditional Synchronization Primitives
//!
//! Every atomic, `Arc` and `Mutex` used by the generation counters and the
//! storage backend is imported from here, so the same code runs against
//! std in normal builds and against Loom's model-checking primitives when
//! compiled with:
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test --features loom --test loom_generation --release
//! ```
//!
//! In standard mode these are plain re-exports with zero overhead.

#[cfg(all(feature = "loom", loom))]
pub mod atomic {
    //! Atomic types for Loom model checking.

    pub use loom::sync::atomic::{AtomicU64, Ordering};
}

#[cfg(not(all(feature = "loom", loom)))]
pub mod atomic {
    //! Standard library atomic types.

    pub use core::sync::atomic::{AtomicU64, Ordering};
}

#[cfg(all(feature = "loom", loom))]
pub use loom::sync::{Arc, Mutex, MutexGuard};

#[cfg(not(all(feature = "loom", loom)))]
pub use std::sync::{Arc, Mutex, MutexGuard};

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// A poisoned lock only means an invariant panic unwound through a holder;
/// the counters it protects are never left half-updated, so the state is
/// still usable.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
