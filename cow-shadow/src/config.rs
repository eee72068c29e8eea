//! Instrumentation configuration.
//!
//! Shadow-storage tracking is off unless switched on. The build-time default
//! comes from the `instrument-cow` feature; hosts can override it per
//! construction, or read it from the environment with
//! [`Instrumentation::from_env`].

use core::fmt;
use core::str::FromStr;

use std::env::VarError;

use crate::error::{Error, Result};

/// Environment variable consulted by [`Instrumentation::from_env`].
pub const ENV_INSTRUMENT: &str = "COW_SHADOW_INSTRUMENT";

/// Generation at which a fresh storage lineage starts.
pub const INITIAL_GENERATION: u64 = 0;

/// Whether shadow storages are tracked and exposed through
/// [`ShadowStorageMixin`](crate::ShadowStorageMixin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrumentation {
    /// Shadow storages are tracked, shared and exposed.
    Enabled,
    /// Mixins are zero-state no-ops.
    Disabled,
}

impl Instrumentation {
    /// The compile-time default, selected by the `instrument-cow` feature.
    pub const BUILD_DEFAULT: Instrumentation = if cfg!(feature = "instrument-cow") {
        Instrumentation::Enabled
    } else {
        Instrumentation::Disabled
    };

    /// Returns `true` when tracking is enabled.
    #[inline]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Instrumentation::Enabled)
    }

    /// Reads the setting from [`ENV_INSTRUMENT`].
    ///
    /// An unset variable yields [`Instrumentation::BUILD_DEFAULT`]; a set but
    /// unrecognised value (including one that is not valid Unicode) is an
    /// error rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        match std::env::var(ENV_INSTRUMENT) {
            Ok(value) => {
                let parsed = value.parse()?;
                tracing::debug!(
                    target: "cow_shadow::config",
                    value = %value,
                    instrumentation = %parsed,
                    "instrumentation_from_env"
                );
                Ok(parsed)
            }
            Err(VarError::NotPresent) => Ok(Self::BUILD_DEFAULT),
            Err(VarError::NotUnicode(raw)) => Err(Error::InvalidInstrumentation {
                value: raw.to_string_lossy().into_owned(),
            }),
        }
    }
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self::BUILD_DEFAULT
    }
}

impl From<bool> for Instrumentation {
    fn from(enabled: bool) -> Self {
        if enabled {
            Instrumentation::Enabled
        } else {
            Instrumentation::Disabled
        }
    }
}

impl FromStr for Instrumentation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "enabled" => Ok(Instrumentation::Enabled),
            "0" | "false" | "off" | "disabled" => Ok(Instrumentation::Disabled),
            _ => Err(Error::InvalidInstrumentation {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrumentation::Enabled => write!(f, "enabled"),
            Instrumentation::Disabled => write!(f, "disabled"),
        }
    }
}
