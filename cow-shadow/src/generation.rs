//! Monotonic Generation Counters
//!
//! A generation counts the tracked mutations observed on one storage
//! lineage. The counting rules are written once, in [`GenerationCounter`],
//! and the ownership policy only decides how the value is stored:
//!
//! | Policy        | Cell              | Holder                    | Thread-safety   |
//! |---------------|-------------------|---------------------------|-----------------|
//! | [`Shared`]    | `AtomicU64`       | `Arc<...>`, many owners   | `Send + Sync`   |
//! | [`Exclusive`] | `Cell<u64>`       | by value, single owner    | `Send`, `!Sync` |
//!
//! # Invariants
//!
//! 1. The value never decreases.
//! 2. Each bump adds exactly one and returns the new value.
//! 3. A bump at `u64::MAX` is a fatal invariant violation; the counter never
//!    wraps back to zero, since a wrapped generation would compare as older
//!    than every shadow and silently corrupt divergence detection.
//!
//! Shared counters bump with a single atomic read-modify-write, so
//! concurrent bumps are never lost and each caller observes a distinct
//! return value.

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;

use crate::sync::atomic::{AtomicU64, Ordering};

/// Largest generation a counter can hold; a counter at this value is
/// exhausted.
pub const MAX_GENERATION: u64 = u64::MAX;

mod sealed {
    pub trait Sealed {}
}

/// Storage cell for a generation value.
///
/// Implemented by the cell types of the two ownership policies; not meant
/// to be implemented outside this crate.
pub trait GenerationCell: sealed::Sealed {
    /// Creates a cell holding `generation`.
    fn new(generation: u64) -> Self;

    /// Reads the current value.
    fn load(&self) -> u64;

    /// Applies `f` to the current value and stores the result, as one
    /// indivisible step with respect to other users of the cell.
    ///
    /// Returns `Ok(previous)` if `f` produced a new value, or
    /// `Err(current)` if it returned `None`, in which case nothing is stored.
    fn fetch_update<F>(&self, f: F) -> Result<u64, u64>
    where
        F: FnMut(u64) -> Option<u64>;
}

/// Selects how a [`GenerationCounter`] is held.
pub trait OwnershipPolicy: sealed::Sealed + 'static {
    /// The cell that stores the value under this policy.
    type Cell: GenerationCell;

    /// Name of the policy for debugging
    const NAME: &'static str;
}

/// Many owners, reference-counted, possibly on different threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shared;

/// A single owner; the counter is moved or cloned as a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exclusive;

impl sealed::Sealed for Shared {}
impl sealed::Sealed for Exclusive {}

impl OwnershipPolicy for Shared {
    type Cell = AtomicGeneration;
    const NAME: &'static str = "Shared";
}

impl OwnershipPolicy for Exclusive {
    type Cell = LocalGeneration;
    const NAME: &'static str = "Exclusive";
}

/// Atomic cell backing [`Shared`] counters.
#[derive(Debug)]
pub struct AtomicGeneration(AtomicU64);

impl sealed::Sealed for AtomicGeneration {}

impl GenerationCell for AtomicGeneration {
    #[inline]
    fn new(generation: u64) -> Self {
        Self(AtomicU64::new(generation))
    }

    #[inline]
    fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    fn fetch_update<F>(&self, f: F) -> Result<u64, u64>
    where
        F: FnMut(u64) -> Option<u64>,
    {
        self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, f)
    }
}

/// Plain cell backing [`Exclusive`] counters.
#[derive(Debug, Clone)]
pub struct LocalGeneration(Cell<u64>);

impl sealed::Sealed for LocalGeneration {}

impl GenerationCell for LocalGeneration {
    #[inline]
    fn new(generation: u64) -> Self {
        Self(Cell::new(generation))
    }

    #[inline]
    fn load(&self) -> u64 {
        self.0.get()
    }

    #[inline]
    fn fetch_update<F>(&self, mut f: F) -> Result<u64, u64>
    where
        F: FnMut(u64) -> Option<u64>,
    {
        let current = self.0.get();
        match f(current) {
            Some(next) => {
                self.0.set(next);
                Ok(current)
            }
            None => Err(current),
        }
    }
}

/// A monotonic, overflow-guarded count of observed mutations.
///
/// # Example
///
/// ```rust
/// use cow_shadow::generation::{ExclusiveGenerationCounter, SharedGenerationCounter};
///
/// let shared = SharedGenerationCounter::new(5);
/// let exclusive = ExclusiveGenerationCounter::new(5);
///
/// assert_eq!(shared.bump_generation(), 6);
/// assert_eq!(exclusive.bump_generation(), 6);
/// assert_eq!(shared.generation(), exclusive.generation());
/// ```
pub struct GenerationCounter<P: OwnershipPolicy> {
    cell: P::Cell,
    _policy: PhantomData<P>,
}

/// Counter held behind `Arc` by several owners.
pub type SharedGenerationCounter = GenerationCounter<Shared>;

/// Counter owned by exactly one holder.
pub type ExclusiveGenerationCounter = GenerationCounter<Exclusive>;

impl<P: OwnershipPolicy> GenerationCounter<P> {
    /// Creates a counter that has already observed `generation` mutations.
    #[inline]
    pub fn new(generation: u64) -> Self {
        Self {
            cell: P::Cell::new(generation),
            _policy: PhantomData,
        }
    }

    /// Returns the current generation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.cell.load()
    }

    /// Returns `true` once the counter can no longer be bumped.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.generation() == MAX_GENERATION
    }

    /// Records one more mutation and returns the new generation.
    ///
    /// # Panics
    ///
    /// Fatal invariant violation if the counter is already at
    /// [`MAX_GENERATION`].
    #[inline]
    pub fn bump_generation(&self) -> u64 {
        match self.cell.fetch_update(|generation| generation.checked_add(1)) {
            Ok(previous) => previous + 1,
            Err(current) => {
                crate::invariant!(
                    current < MAX_GENERATION,
                    "{} generation counter exhausted at {}",
                    P::NAME,
                    current
                );
                unreachable!("checked_add fails only at MAX_GENERATION")
            }
        }
    }
}

impl<P: OwnershipPolicy> Default for GenerationCounter<P> {
    fn default() -> Self {
        Self::new(crate::config::INITIAL_GENERATION)
    }
}

impl<P: OwnershipPolicy> fmt::Debug for GenerationCounter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationCounter")
            .field("policy", &P::NAME)
            .field("generation", &self.generation())
            .finish()
    }
}

/// Exclusive counters copy as value snapshots; the copy counts on
/// independently.
impl Clone for GenerationCounter<Exclusive> {
    fn clone(&self) -> Self {
        Self::new(self.generation())
    }
}
