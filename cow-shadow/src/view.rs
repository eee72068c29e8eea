//! Views over Shared Storage
//!
//! A [`View`] is the host object a [`ShadowStorageMixin`] attaches to. It
//! is deliberately minimal (no shape, no dtype) and exists to drive the
//! divergence protocol end to end:
//!
//! ```text
//! let mut a = View::new(storage, Enabled);   // no simulator yet: untracked
//! let b = a.simulate_lazy_clone();            // a, b: shadows at live = G
//! a.record_write();                           // live = G+1, a's shadow = G+1
//! b.check_access();                           // Tracked(Stale { G, G+1 })
//! ```
//!
//! Aliases share their source's shadow, so a write through one alias keeps
//! every alias of the same lineage in sync.

use core::fmt;

use crate::config::Instrumentation;
use crate::shadow::{ShadowStorage, ShadowStorageHost, ShadowStorageMixin};
use crate::simulator::{CopyOnWriteSimulator, Divergence};
use crate::storage::{Storage, StorageBackend, StorageImpl};
use crate::sync::Arc;

/// What a view access means under simulated copy-on-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Tracking is disabled for this view, or the storage is not simulating.
    Untracked,
    /// The view's shadow was compared with the live generation.
    Tracked(Divergence),
}

impl Access {
    /// Returns `true` if the access was tracked and found the view stale or
    /// foreign.
    #[inline]
    pub fn has_diverged(&self) -> bool {
        matches!(self, Access::Tracked(d) if d.has_diverged())
    }
}

/// A logical view over a shared [`Storage`].
pub struct View<B: StorageBackend = StorageImpl> {
    storage: Storage<B>,
    shadow: ShadowStorageMixin,
    instrumentation: Instrumentation,
}

impl<B: StorageBackend> View<B> {
    /// Creates a view over `storage`.
    ///
    /// If the storage is already simulating copy-on-write and tracking is
    /// enabled, the view starts its own lineage with a shadow frozen at the
    /// live generation.
    ///
    /// # Panics
    ///
    /// Fatal invariant violation if `storage` is a null handle.
    pub fn new(storage: Storage<B>, instrumentation: Instrumentation) -> Self {
        crate::invariant!(storage.is_valid(), "storage has no backing implementation");

        let shadow = match instrumentation {
            Instrumentation::Enabled => storage
                .copy_on_write_simulator()
                .map(|simulator| simulator.new_shadow_storage()),
            Instrumentation::Disabled => None,
        };
        Self {
            storage,
            shadow: ShadowStorageMixin::with_instrumentation(shadow, instrumentation),
            instrumentation,
        }
    }

    /// Returns another view of the same lineage, sharing this view's shadow.
    pub fn alias(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            shadow: self.shadow.clone(),
            instrumentation: self.instrumentation,
        }
    }

    /// Starts simulating copy-on-write on the storage (if not already) and
    /// returns a view that, under real copy-on-write, would be an
    /// independent copy.
    ///
    /// Both this view and the returned one hold shadows at the live
    /// generation afterwards. Aliases taken from this view before the first
    /// lazy clone remain untracked.
    pub fn simulate_lazy_clone(&mut self) -> Self {
        let simulator = self.storage.simulate_copy_on_write(None);

        if self.instrumentation.is_enabled() && !self.shadow.is_tracking() {
            self.shadow = ShadowStorageMixin::with_instrumentation(
                Some(simulator.new_shadow_storage()),
                self.instrumentation,
            );
        }

        let shadow = match self.instrumentation {
            Instrumentation::Enabled => Some(simulator.new_shadow_storage()),
            Instrumentation::Disabled => None,
        };
        tracing::debug!(
            target: "cow_shadow::view",
            generation = simulator.storage_generation(),
            instrumentation = %self.instrumentation,
            "cow_lazy_clone"
        );
        Self {
            storage: self.storage.clone(),
            shadow: ShadowStorageMixin::with_instrumentation(shadow, self.instrumentation),
            instrumentation: self.instrumentation,
        }
    }

    /// Compares this view's shadow with the live generation without
    /// recording anything.
    pub fn check_access(&self) -> Access {
        match (self.shadow.shadow_storage(), self.storage.copy_on_write_simulator()) {
            (Some(shadow), Some(simulator)) => Access::Tracked(simulator.check_generation(shadow)),
            _ => Access::Untracked,
        }
    }

    /// Records a write through this view.
    ///
    /// Returns what the view looked like *before* the write. The write
    /// itself is forwarded to the storage; when it is tracked, this
    /// lineage's shadow advances with the live generation.
    pub fn record_write(&mut self) -> Access {
        let access = self.check_access();
        let simulator = self.storage.copy_on_write_simulator();

        self.storage
            .maybe_bump_copy_on_write_generation(simulator.as_ref());

        if simulator.is_some() {
            if let Some(shadow) = self.shadow.shadow_storage() {
                shadow.bump_generation();
            }
        }

        if access.has_diverged() {
            tracing::warn!(
                target: "cow_shadow::view",
                ?access,
                "cow_write_to_diverged_view"
            );
        }
        access
    }

    /// The storage this view reads and writes.
    #[inline]
    pub fn storage(&self) -> &Storage<B> {
        &self.storage
    }

    /// The simulator attached to the storage, if any.
    pub fn simulator(&self) -> Option<Arc<CopyOnWriteSimulator>> {
        self.storage.copy_on_write_simulator()
    }

    /// Owning reference to this view's shadow, if tracking.
    #[inline]
    pub fn shadow_storage_ref(&self) -> Option<Arc<ShadowStorage>> {
        self.shadow.shadow_storage_ref()
    }

    /// The instrumentation setting this view was created with.
    #[inline]
    pub fn instrumentation(&self) -> Instrumentation {
        self.instrumentation
    }

    /// Returns `true` if both views share one shadow (same lineage).
    pub fn shares_lineage_with(&self, other: &Self) -> bool {
        match (self.shadow.shadow_storage(), other.shadow.shadow_storage()) {
            (Some(a), Some(b)) => core::ptr::eq(a, b),
            _ => false,
        }
    }
}

impl<B: StorageBackend> ShadowStorageHost for View<B> {
    fn shadow_mixin(&self) -> &ShadowStorageMixin {
        &self.shadow
    }
}

impl<B: StorageBackend + fmt::Debug> fmt::Debug for View<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("storage", &self.storage)
            .field("shadow", &self.shadow)
            .finish()
    }
}
