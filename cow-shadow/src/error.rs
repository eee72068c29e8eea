//! Error types and internal-consistency checks.
//!
//! The core has exactly two failure categories:
//!
//! - **Fatal invariant violations** (a null backing storage, a generation
//!   counter asked to bump past `u64::MAX`). These are broken caller
//!   contracts and are raised through [`invariant!`](crate::invariant), which
//!   logs at ERROR and then panics, or aborts the process when the
//!   `abort-on-violation` feature is enabled. There is no recovery path.
//! - **Configuration errors** ([`Error`]), the only recoverable errors.

use thiserror::Error;

/// Recoverable errors of the crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An instrumentation setting was not one of the recognised spellings.
    #[error("invalid instrumentation setting {value:?} (expected enabled/disabled, on/off, true/false or 1/0)")]
    InvalidInstrumentation {
        /// The rejected value
        value: String,
    },
}

/// Result type for cow-shadow operations
pub type Result<T> = core::result::Result<T, Error>;

/// Checks an internal-consistency invariant.
///
/// On failure the violation is logged under the `cow_shadow::invariant`
/// target and the current execution is terminated (panic, or abort with the
/// `abort-on-violation` feature).
///
/// ```should_panic
/// let generation = u64::MAX;
/// cow_shadow::invariant!(generation != u64::MAX, "generation counter exhausted");
/// ```
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::error::violation(
                ::core::stringify!($cond),
                ::core::format_args!($($arg)+),
            );
        }
    };
}

/// Reports a violated invariant and terminates. Not meant to be called
/// directly; use [`invariant!`](crate::invariant).
#[doc(hidden)]
#[cold]
#[inline(never)]
#[track_caller]
pub fn violation(condition: &'static str, message: core::fmt::Arguments<'_>) -> ! {
    let location = core::panic::Location::caller();
    tracing::error!(
        target: "cow_shadow::invariant",
        condition,
        %location,
        "internal invariant violated: {}",
        message
    );

    #[cfg(feature = "abort-on-violation")]
    {
        std::process::abort();
    }

    #[cfg(not(feature = "abort-on-violation"))]
    {
        panic!("internal invariant violated: `{}`: {}", condition, message);
    }
}
