//! Shadow Storages
//!
//! A shadow storage is a frozen snapshot of a storage lineage's generation,
//! captured by a view when it starts tracking divergence. It holds no
//! reference back to the storage; whoever compares generations correlates
//! the two.
//!
//! ```text
//!   Storage ──► CopyOnWriteSimulator { live: 3 }
//!                     ▲
//!        compare      │      compare
//!   View A ───────────┼─────────── View B
//!   Mixin ─► Shadow { 3 }          Mixin ─► Shadow { 0 }   (stale)
//! ```
//!
//! Views derived from a common lineage point share one `Arc<ShadowStorage>`
//! through their [`ShadowStorageMixin`]s.

use core::fmt;
use core::ops::Deref;

use crate::config::Instrumentation;
use crate::generation::{Exclusive, GenerationCounter, OwnershipPolicy, Shared};
use crate::sync::Arc;

/// One lineage's recorded snapshot of mutation history.
pub struct ShadowStorageImpl<P: OwnershipPolicy> {
    generation: GenerationCounter<P>,
}

/// Shadow shared between views through `Arc`.
pub type ShadowStorage = ShadowStorageImpl<Shared>;

/// Shadow embedded by value in a single owner.
pub type ExclusiveShadowStorage = ShadowStorageImpl<Exclusive>;

impl<P: OwnershipPolicy> ShadowStorageImpl<P> {
    /// Creates a shadow that has observed `generation` mutations.
    #[inline]
    pub fn new(generation: u64) -> Self {
        Self {
            generation: GenerationCounter::new(generation),
        }
    }

    /// Returns the recorded generation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.generation()
    }

    /// Returns `true` once the shadow can record no further mutation.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.generation.is_exhausted()
    }

    /// Records one more mutation seen through this shadow's lineage.
    ///
    /// # Panics
    ///
    /// Fatal invariant violation if the generation is already `u64::MAX`.
    #[inline]
    pub fn bump_generation(&self) -> u64 {
        self.generation.bump_generation()
    }
}

impl ShadowStorage {
    /// Creates a shared shadow ready to hand to a mixin.
    pub fn new_shared(generation: u64) -> Arc<Self> {
        Arc::new(Self::new(generation))
    }
}

impl<P: OwnershipPolicy> fmt::Debug for ShadowStorageImpl<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowStorage")
            .field("policy", &P::NAME)
            .field("generation", &self.generation())
            .finish()
    }
}

impl Clone for ExclusiveShadowStorage {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation.clone(),
        }
    }
}

/// Optional shadow-storage capability of a host view.
///
/// `NotTracking` holds nothing, so a host that never enables instrumentation
/// pays one pointer-sized word and no allocation.
///
/// # Example
///
/// ```rust
/// use cow_shadow::{Instrumentation, ShadowStorage, ShadowStorageMixin};
///
/// let shadow = ShadowStorage::new_shared(0);
///
/// let on = ShadowStorageMixin::with_instrumentation(Some(shadow.clone()), Instrumentation::Enabled);
/// assert!(std::ptr::eq(on.shadow_storage().unwrap(), &*shadow));
///
/// let off = ShadowStorageMixin::with_instrumentation(Some(shadow), Instrumentation::Disabled);
/// assert!(off.shadow_storage().is_none());
/// assert!(off.shadow_storage_ref().is_none());
/// ```
#[derive(Clone, Default)]
pub enum ShadowStorageMixin {
    /// The host tracks divergence through `shadow`.
    Tracking {
        /// Shadow shared with every view of the same lineage
        shadow: Arc<ShadowStorage>,
    },
    /// The host does not track divergence.
    #[default]
    NotTracking,
}

impl ShadowStorageMixin {
    /// Creates a mixin using the build-time instrumentation default.
    pub fn new(shadow: Option<Arc<ShadowStorage>>) -> Self {
        Self::with_instrumentation(shadow, Instrumentation::BUILD_DEFAULT)
    }

    /// Creates a mixin with an explicit instrumentation setting.
    ///
    /// With instrumentation disabled the supplied reference is released
    /// immediately and the mixin retains no state.
    pub fn with_instrumentation(
        shadow: Option<Arc<ShadowStorage>>,
        instrumentation: Instrumentation,
    ) -> Self {
        match (instrumentation, shadow) {
            (Instrumentation::Enabled, Some(shadow)) => ShadowStorageMixin::Tracking { shadow },
            _ => ShadowStorageMixin::NotTracking,
        }
    }

    /// Returns `true` if this mixin exposes a shadow storage.
    #[inline]
    pub fn is_tracking(&self) -> bool {
        matches!(self, ShadowStorageMixin::Tracking { .. })
    }

    /// Borrows the shadow storage, or `None` when not tracking.
    #[inline]
    pub fn shadow_storage(&self) -> Option<&ShadowStorage> {
        match self {
            ShadowStorageMixin::Tracking { shadow } => Some(&**shadow),
            ShadowStorageMixin::NotTracking => None,
        }
    }

    /// Returns a new owning reference to the shadow storage, or `None` when
    /// not tracking. Refers to the same object as
    /// [`shadow_storage`](Self::shadow_storage).
    #[inline]
    pub fn shadow_storage_ref(&self) -> Option<Arc<ShadowStorage>> {
        match self {
            ShadowStorageMixin::Tracking { shadow } => Some(Arc::clone(shadow)),
            ShadowStorageMixin::NotTracking => None,
        }
    }
}

impl fmt::Debug for ShadowStorageMixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShadowStorageMixin::Tracking { shadow } => f
                .debug_struct("Tracking")
                .field("generation", &shadow.generation())
                .finish(),
            ShadowStorageMixin::NotTracking => f.write_str("NotTracking"),
        }
    }
}

/// Hosts that carry a [`ShadowStorageMixin`] expose it through this trait.
pub trait ShadowStorageHost {
    /// Returns the host's mixin.
    fn shadow_mixin(&self) -> &ShadowStorageMixin;

    /// Shorthand for `shadow_mixin().shadow_storage()`.
    fn shadow_storage(&self) -> Option<&ShadowStorage> {
        self.shadow_mixin().shadow_storage()
    }
}

impl ShadowStorageHost for ShadowStorageMixin {
    fn shadow_mixin(&self) -> &ShadowStorageMixin {
        self
    }
}

impl<T: ShadowStorageHost> ShadowStorageHost for Arc<T> {
    fn shadow_mixin(&self) -> &ShadowStorageMixin {
        self.deref().shadow_mixin()
    }
}
