//! Copy-On-Write Simulator
//!
//! Once a storage starts simulating copy-on-write it attaches one
//! [`CopyOnWriteSimulator`], which owns the storage's *live* generation.
//! Every tracked write advances the live generation; views compare their
//! frozen [`ShadowStorage`] against it to learn whether a real
//! copy-on-write would have given them different data.
//!
//! # Protocol
//!
//! ```text
//! 1. storage.simulate_copy_on_write(..)      -> simulator (live = G0)
//! 2. simulator.new_shadow_storage()          -> shadow frozen at live
//! 3. storage.maybe_bump_..(Some(&simulator)) -> live += 1
//! 4. simulator.check_generation(&shadow)     -> InSync | Stale | Ahead
//! ```
//!
//! The simulator never copies anything and never decides *what* to do with
//! a stale view; it only answers the comparison.

use core::cmp::Ordering as CmpOrdering;
use core::fmt;

use crate::generation::SharedGenerationCounter;
use crate::shadow::ShadowStorage;
use crate::sync::Arc;

#[cfg(feature = "statistics")]
use crate::sync::atomic::{AtomicU64, Ordering};

/// Outcome of comparing a shadow generation with the live generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Divergence {
    /// The shadow has seen every tracked write.
    InSync,
    /// Writes through another lineage happened after the shadow was taken;
    /// under real copy-on-write this view would not observe them.
    Stale {
        /// Generation recorded by the shadow
        shadow: u64,
        /// Live generation of the storage
        live: u64,
    },
    /// The shadow claims more writes than the storage has seen; it belongs
    /// to a different lineage.
    Ahead {
        /// Generation recorded by the shadow
        shadow: u64,
        /// Live generation of the storage
        live: u64,
    },
}

impl Divergence {
    /// Compares a shadow generation against the live one.
    #[inline]
    pub fn between(shadow: u64, live: u64) -> Self {
        match shadow.cmp(&live) {
            CmpOrdering::Equal => Divergence::InSync,
            CmpOrdering::Less => Divergence::Stale { shadow, live },
            CmpOrdering::Greater => Divergence::Ahead { shadow, live },
        }
    }

    /// Returns `true` unless the generations match.
    #[inline]
    pub fn has_diverged(&self) -> bool {
        !matches!(self, Divergence::InSync)
    }

    /// Number of live writes the shadow has not observed.
    #[inline]
    pub fn missed_writes(&self) -> u64 {
        match *self {
            Divergence::Stale { shadow, live } => live - shadow,
            _ => 0,
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::InSync => write!(f, "in sync"),
            Divergence::Stale { shadow, live } => {
                write!(f, "stale: shadow {} behind live {}", shadow, live)
            }
            Divergence::Ahead { shadow, live } => {
                write!(f, "ahead: shadow {} beyond live {}", shadow, live)
            }
        }
    }
}

/// Counters kept per simulator (optional)
#[cfg(feature = "statistics")]
#[derive(Debug, Default)]
struct SimulatorStats {
    /// Total number of generation bumps
    bumps: AtomicU64,
    /// Total number of shadow comparisons
    checks: AtomicU64,
    /// Comparisons that found a diverged shadow
    divergences: AtomicU64,
}

/// Snapshot of a simulator's statistics.
#[cfg(feature = "statistics")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStatistics {
    /// Total number of generation bumps
    pub bumps: u64,
    /// Total number of shadow comparisons
    pub checks: u64,
    /// Comparisons that found a diverged shadow
    pub divergences: u64,
}

/// Owner of a storage's live generation while copy-on-write is simulated.
///
/// Shared between the storage and every caller through `Arc`.
///
/// # Example
///
/// ```rust
/// use cow_shadow::{CopyOnWriteSimulator, Divergence};
///
/// let simulator = CopyOnWriteSimulator::new(0);
/// let shadow = simulator.new_shadow_storage();
///
/// simulator.bump_generation();
/// assert_eq!(
///     simulator.check_generation(&shadow),
///     Divergence::Stale { shadow: 0, live: 1 }
/// );
/// ```
pub struct CopyOnWriteSimulator {
    live: SharedGenerationCounter,
    #[cfg(feature = "statistics")]
    stats: SimulatorStats,
}

impl CopyOnWriteSimulator {
    /// Creates a simulator whose live generation starts at `generation`.
    pub fn new(generation: u64) -> Self {
        Self {
            live: SharedGenerationCounter::new(generation),
            #[cfg(feature = "statistics")]
            stats: SimulatorStats::default(),
        }
    }

    /// Creates a simulator already wrapped for sharing.
    pub fn new_shared(generation: u64) -> Arc<Self> {
        Arc::new(Self::new(generation))
    }

    /// Returns the live generation of the simulated storage.
    #[inline]
    pub fn storage_generation(&self) -> u64 {
        self.live.generation()
    }

    /// Advances the live generation by one tracked write.
    ///
    /// # Panics
    ///
    /// Fatal invariant violation if the live generation is exhausted.
    pub fn bump_generation(&self) -> u64 {
        let generation = self.live.bump_generation();

        #[cfg(feature = "statistics")]
        self.stats.bumps.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            target: "cow_shadow::simulator",
            generation,
            "cow_generation_bump"
        );
        generation
    }

    /// Returns a new shadow frozen at the current live generation.
    pub fn new_shadow_storage(&self) -> Arc<ShadowStorage> {
        let generation = self.storage_generation();
        tracing::trace!(
            target: "cow_shadow::simulator",
            generation,
            "cow_shadow_created"
        );
        ShadowStorage::new_shared(generation)
    }

    /// Compares `shadow` with the live generation.
    ///
    /// Diverged shadows are reported at WARN; the comparison itself has no
    /// other effect.
    pub fn check_generation(&self, shadow: &ShadowStorage) -> Divergence {
        let divergence = Divergence::between(shadow.generation(), self.storage_generation());

        #[cfg(feature = "statistics")]
        {
            self.stats.checks.fetch_add(1, Ordering::Relaxed);
            if divergence.has_diverged() {
                self.stats.divergences.fetch_add(1, Ordering::Relaxed);
            }
        }

        match divergence {
            Divergence::InSync => tracing::trace!(
                target: "cow_shadow::simulator",
                generation = shadow.generation(),
                "cow_shadow_in_sync"
            ),
            Divergence::Stale { shadow, live } => tracing::warn!(
                target: "cow_shadow::simulator",
                shadow,
                live,
                "cow_shadow_stale: view would not observe {} write(s) under copy-on-write",
                live - shadow
            ),
            Divergence::Ahead { shadow, live } => tracing::warn!(
                target: "cow_shadow::simulator",
                shadow,
                live,
                "cow_shadow_ahead: shadow belongs to another lineage"
            ),
        }
        divergence
    }

    /// Returns the simulator's statistics.
    #[cfg(feature = "statistics")]
    pub fn statistics(&self) -> SimulatorStatistics {
        SimulatorStatistics {
            bumps: self.stats.bumps.load(Ordering::Relaxed),
            checks: self.stats.checks.load(Ordering::Relaxed),
            divergences: self.stats.divergences.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for CopyOnWriteSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyOnWriteSimulator")
            .field("generation", &self.storage_generation())
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_between() {
        assert_eq!(Divergence::between(3, 3), Divergence::InSync);
        assert_eq!(
            Divergence::between(1, 4),
            Divergence::Stale { shadow: 1, live: 4 }
        );
        assert_eq!(
            Divergence::between(5, 2),
            Divergence::Ahead { shadow: 5, live: 2 }
        );
    }

    #[test]
    fn test_missed_writes() {
        assert_eq!(Divergence::between(1, 4).missed_writes(), 3);
        assert_eq!(Divergence::between(4, 4).missed_writes(), 0);
        assert_eq!(Divergence::between(6, 4).missed_writes(), 0);
    }

    #[test]
    fn test_shadow_taken_now_is_in_sync() {
        let simulator = CopyOnWriteSimulator::new(10);
        let shadow = simulator.new_shadow_storage();
        assert_eq!(shadow.generation(), 10);
        assert_eq!(simulator.check_generation(&shadow), Divergence::InSync);
    }

    #[test]
    fn test_bump_leaves_old_shadow_stale() {
        let simulator = CopyOnWriteSimulator::new(0);
        let shadow = simulator.new_shadow_storage();

        assert_eq!(simulator.bump_generation(), 1);
        assert_eq!(simulator.bump_generation(), 2);

        let divergence = simulator.check_generation(&shadow);
        assert!(divergence.has_diverged());
        assert_eq!(divergence, Divergence::Stale { shadow: 0, live: 2 });
        assert_eq!(shadow.generation(), 0);
    }

    #[test]
    fn test_foreign_shadow_is_ahead() {
        let simulator = CopyOnWriteSimulator::new(1);
        let foreign = ShadowStorage::new(9);
        assert_eq!(
            simulator.check_generation(&foreign),
            Divergence::Ahead { shadow: 9, live: 1 }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Divergence::InSync.to_string(), "in sync");
        assert_eq!(
            Divergence::between(0, 3).to_string(),
            "stale: shadow 0 behind live 3"
        );
    }

    #[cfg(feature = "statistics")]
    #[test]
    fn test_statistics() {
        let simulator = CopyOnWriteSimulator::new(0);
        let shadow = simulator.new_shadow_storage();

        simulator.check_generation(&shadow);
        simulator.bump_generation();
        simulator.check_generation(&shadow);

        assert_eq!(
            simulator.statistics(),
            SimulatorStatistics {
                bumps: 1,
                checks: 2,
                divergences: 1,
            }
        );
    }
}
