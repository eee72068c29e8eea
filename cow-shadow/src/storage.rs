//! Storage Façade and Default Backend
//!
//! [`Storage`] is a cheap, cloneable handle over a shared backing
//! implementation. It forwards copy-on-write simulation requests to the
//! backend and asserts that the backend is present: a null handle (the
//! `Default` value) exists only so containers can be built before a storage
//! is assigned, and using one is a fatal contract violation.
//!
//! # Backend policy
//!
//! [`StorageImpl`], the default backend, keeps under one mutex:
//!
//! - its own mutation history, an [`ExclusiveShadowStorage`] bumped on every
//!   write request, and
//! - the attached [`CopyOnWriteSimulator`], if simulation has started.
//!
//! ```text
//! simulate_copy_on_write(s)          maybe_bump_copy_on_write_generation(s)
//!   attached?  -> return attached      writes or live at MAX -> fatal
//!   supplied?  -> attach supplied      attached or supplied? -> live += 1
//!   otherwise  -> attach new(writes)   writes += 1
//! ```
//!
//! Attachment is permanent, so once simulation starts every write through
//! this storage is tracked and the live generation equals the storage's own
//! write count.

use core::fmt;

use crate::shadow::ExclusiveShadowStorage;
use crate::simulator::CopyOnWriteSimulator;
use crate::sync::{lock, Arc, Mutex};

/// Backing implementation behind a [`Storage`] handle.
pub trait StorageBackend: Send + Sync {
    /// Establishes or continues copy-on-write simulation and returns the
    /// simulator tracking this storage.
    fn simulate_copy_on_write(
        &self,
        simulator: Option<&Arc<CopyOnWriteSimulator>>,
    ) -> Arc<CopyOnWriteSimulator>;

    /// Records a write and bumps the live generation if the write is
    /// tracked.
    fn maybe_bump_copy_on_write_generation(&self, simulator: Option<&Arc<CopyOnWriteSimulator>>);

    /// The simulator attached to this storage, if simulation has started.
    fn copy_on_write_simulator(&self) -> Option<Arc<CopyOnWriteSimulator>>;

    /// Number of writes recorded by the storage itself.
    fn generation(&self) -> u64;

    /// Size of the underlying buffer in bytes.
    fn nbytes(&self) -> usize;
}

/// Mutable copy-on-write state of a [`StorageImpl`].
#[derive(Debug)]
struct CowState {
    writes: ExclusiveShadowStorage,
    simulator: Option<Arc<CopyOnWriteSimulator>>,
}

/// Default storage backend: buffer metadata plus copy-on-write state.
pub struct StorageImpl {
    nbytes: usize,
    cow: Mutex<CowState>,
}

impl StorageImpl {
    /// Creates a backend for a buffer of `nbytes` that has seen no writes.
    pub fn new(nbytes: usize) -> Self {
        Self::with_generation(nbytes, crate::config::INITIAL_GENERATION)
    }

    /// Creates a backend whose mutation history already counts
    /// `generation` writes.
    pub fn with_generation(nbytes: usize, generation: u64) -> Self {
        Self {
            nbytes,
            cow: Mutex::new(CowState {
                writes: ExclusiveShadowStorage::new(generation),
                simulator: None,
            }),
        }
    }
}

impl StorageBackend for StorageImpl {
    fn simulate_copy_on_write(
        &self,
        simulator: Option<&Arc<CopyOnWriteSimulator>>,
    ) -> Arc<CopyOnWriteSimulator> {
        let mut state = lock(&self.cow);

        if let Some(attached) = &state.simulator {
            if let Some(supplied) = simulator {
                if !Arc::ptr_eq(attached, supplied) {
                    tracing::warn!(
                        target: "cow_shadow::storage",
                        attached = attached.storage_generation(),
                        supplied = supplied.storage_generation(),
                        "cow_simulator_mismatch: keeping the attached simulator"
                    );
                }
            }
            return Arc::clone(attached);
        }

        let attached = match simulator {
            Some(supplied) => Arc::clone(supplied),
            None => CopyOnWriteSimulator::new_shared(state.writes.generation()),
        };
        tracing::debug!(
            target: "cow_shadow::storage",
            generation = attached.storage_generation(),
            nbytes = self.nbytes,
            "cow_simulation_started"
        );
        state.simulator = Some(Arc::clone(&attached));
        attached
    }

    fn maybe_bump_copy_on_write_generation(&self, simulator: Option<&Arc<CopyOnWriteSimulator>>) {
        let state = lock(&self.cow);

        // Neither counter may move unless both can.
        crate::invariant!(
            !state.writes.is_exhausted(),
            "storage generation counter exhausted at {}",
            state.writes.generation()
        );

        let tracked = state.simulator.as_ref().or(simulator);
        if let Some(tracked) = tracked {
            if let (Some(attached), Some(supplied)) = (&state.simulator, simulator) {
                if !Arc::ptr_eq(attached, supplied) {
                    tracing::warn!(
                        target: "cow_shadow::storage",
                        "cow_simulator_mismatch: bumping the attached simulator"
                    );
                }
            }
            tracked.bump_generation();
        }

        let writes = state.writes.bump_generation();
        if tracked.is_none() {
            tracing::trace!(target: "cow_shadow::storage", writes, "cow_write_untracked");
        }
    }

    fn copy_on_write_simulator(&self) -> Option<Arc<CopyOnWriteSimulator>> {
        lock(&self.cow).simulator.clone()
    }

    fn generation(&self) -> u64 {
        lock(&self.cow).writes.generation()
    }

    fn nbytes(&self) -> usize {
        self.nbytes
    }
}

impl fmt::Debug for StorageImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.cow);
        f.debug_struct("StorageImpl")
            .field("nbytes", &self.nbytes)
            .field("writes", &state.writes.generation())
            .field("simulator", &state.simulator)
            .finish()
    }
}

/// Shared handle over a storage backend.
///
/// Clones share the backend; it is destroyed when the last handle drops.
///
/// # Example
///
/// ```rust
/// use cow_shadow::Storage;
///
/// let mut storage = Storage::new(64);
/// let simulator = storage.simulate_copy_on_write(None);
/// let shadow = simulator.new_shadow_storage();
///
/// for _ in 0..3 {
///     storage.maybe_bump_copy_on_write_generation(Some(&simulator));
/// }
///
/// assert_eq!(simulator.storage_generation(), 3);
/// assert_eq!(shadow.generation(), 0);
/// ```
pub struct Storage<B: StorageBackend = StorageImpl> {
    storage_impl: Option<Arc<B>>,
}

impl Storage<StorageImpl> {
    /// Allocates a fresh backend for a buffer of `nbytes`.
    pub fn new(nbytes: usize) -> Self {
        Self::from_impl(Arc::new(StorageImpl::new(nbytes)))
    }
}

impl<B: StorageBackend> Storage<B> {
    /// Wraps an existing backend, sharing it with other handles.
    pub fn from_impl(storage_impl: Arc<B>) -> Self {
        Self {
            storage_impl: Some(storage_impl),
        }
    }

    /// A handle with no backend. Any backend operation on it is fatal.
    pub const fn null() -> Self {
        Self { storage_impl: None }
    }

    /// Returns `true` if the handle has a backend.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.storage_impl.is_some()
    }

    /// Borrows the backend.
    ///
    /// # Panics
    ///
    /// Fatal invariant violation on a null handle.
    #[inline]
    #[track_caller]
    pub fn storage_impl(&self) -> &Arc<B> {
        crate::invariant!(
            self.storage_impl.is_some(),
            "storage has no backing implementation"
        );
        match &self.storage_impl {
            Some(storage_impl) => storage_impl,
            None => unreachable!("null storage passed the invariant check"),
        }
    }

    /// Starts or continues copy-on-write simulation, returning the
    /// backend's result unchanged.
    ///
    /// # Panics
    ///
    /// Fatal invariant violation on a null handle.
    #[track_caller]
    pub fn simulate_copy_on_write(
        &self,
        simulator: Option<&Arc<CopyOnWriteSimulator>>,
    ) -> Arc<CopyOnWriteSimulator> {
        self.storage_impl().simulate_copy_on_write(simulator)
    }

    /// Forwards a write to the backend, which bumps the live generation if
    /// the write is tracked.
    ///
    /// # Panics
    ///
    /// Fatal invariant violation on a null handle.
    #[track_caller]
    pub fn maybe_bump_copy_on_write_generation(
        &mut self,
        simulator: Option<&Arc<CopyOnWriteSimulator>>,
    ) {
        self.storage_impl().maybe_bump_copy_on_write_generation(simulator);
    }

    /// The simulator attached to the backend, if any.
    #[track_caller]
    pub fn copy_on_write_simulator(&self) -> Option<Arc<CopyOnWriteSimulator>> {
        self.storage_impl().copy_on_write_simulator()
    }

    /// Number of writes recorded by the backend.
    #[track_caller]
    pub fn generation(&self) -> u64 {
        self.storage_impl().generation()
    }

    /// Size of the underlying buffer in bytes.
    #[track_caller]
    pub fn nbytes(&self) -> usize {
        self.storage_impl().nbytes()
    }

    /// Number of handles sharing the backend.
    #[track_caller]
    pub fn use_count(&self) -> usize {
        Arc::strong_count(self.storage_impl())
    }

    /// Returns `true` if both handles share one backend.
    pub fn is_alias_of(&self, other: &Self) -> bool {
        match (&self.storage_impl, &other.storage_impl) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<B: StorageBackend> Clone for Storage<B> {
    fn clone(&self) -> Self {
        Self {
            storage_impl: self.storage_impl.clone(),
        }
    }
}

impl<B: StorageBackend> Default for Storage<B> {
    fn default() -> Self {
        Self::null()
    }
}

impl<B: StorageBackend + fmt::Debug> fmt::Debug for Storage<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage_impl {
            Some(storage_impl) => f.debug_tuple("Storage").field(storage_impl).finish(),
            None => f.write_str("Storage(null)"),
        }
    }
}
