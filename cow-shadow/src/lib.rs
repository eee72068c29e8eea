//! cow-shadow: Simulated Copy-On-Write for Shared Storage
//!
//! Several views (tensor views, slices, aliases) may share one storage
//! buffer. This crate lets a system find out whether those views *would
//! have* diverged under copy-on-write without ever copying: each view
//! lineage keeps a frozen shadow generation, the storage keeps a live
//! generation, and comparing the two reveals staleness.
//!
//! # Architecture
//!
//! - [`generation`]: monotonic, overflow-guarded counters, parameterized by
//!   ownership policy ([`Shared`](generation::Shared) or
//!   [`Exclusive`](generation::Exclusive))
//! - [`shadow`]: [`ShadowStorage`] snapshots and the optional
//!   [`ShadowStorageMixin`] capability
//! - [`simulator`]: the [`CopyOnWriteSimulator`] owning the live generation
//! - [`storage`]: the [`Storage`] façade and its default backend
//! - [`view`]: a minimal host [`View`] driving the protocol
//!
//! # Invariants
//!
//! ```text
//! ∀ counter c:  c' = c + 1  ∧  c < u64::MAX      (bump)
//! ∀ shadow s, live generation L:  s ≤ L  for shadows of this storage
//! stale(s)  ⟺  s < L
//! ```
//!
//! Violations (a bump at `u64::MAX`, a null storage handle) are broken
//! caller contracts and terminate through [`invariant!`].
//!
//! # Example
//!
//! ```rust
//! use cow_shadow::{Access, Divergence, Instrumentation, Storage, View};
//!
//! let storage = Storage::new(1024);
//! let mut a = View::new(storage, Instrumentation::Enabled);
//! let b = a.simulate_lazy_clone();
//!
//! a.record_write();
//!
//! assert_eq!(a.check_access(), Access::Tracked(Divergence::InSync));
//! assert_eq!(
//!     b.check_access(),
//!     Access::Tracked(Divergence::Stale { shadow: 0, live: 1 })
//! );
//! ```
//!
//! # Feature Flags
//!
//! - `instrument-cow`: track shadows by default
//!   ([`Instrumentation::BUILD_DEFAULT`])
//! - `statistics`: per-simulator counters
//! - `abort-on-violation`: abort instead of panicking on invariant violations
//! - `loom`: model-check the shared counters (with `--cfg loom`)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Conditional synchronization primitives for Loom integration
pub mod sync;

pub mod config;
pub mod error;
pub mod generation;
pub mod shadow;
pub mod simulator;
pub mod storage;
pub mod view;

pub use config::Instrumentation;
pub use error::{Error, Result};
pub use generation::{ExclusiveGenerationCounter, GenerationCounter, SharedGenerationCounter};
pub use shadow::{ExclusiveShadowStorage, ShadowStorage, ShadowStorageHost, ShadowStorageMixin};
pub use simulator::{CopyOnWriteSimulator, Divergence};
pub use storage::{Storage, StorageBackend, StorageImpl};
pub use view::{Access, View};

#[cfg(feature = "statistics")]
pub use simulator::SimulatorStatistics;
