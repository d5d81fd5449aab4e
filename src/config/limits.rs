//! Global limits with compile-time defaults and a one-time runtime override
//!
//! Defaults are compile-time constants. A program may replace them once at
//! startup (the CLI does this from its flags); everything created after
//! that picks up the override.

use once_cell::sync::OnceCell;
use std::path::PathBuf;

/// Default largest range table accepted, in bytes (the platform allocation limit)
pub const DEFAULT_MAX_TABLE_BYTES: usize = isize::MAX as usize;
/// Default range database directory
pub const DEFAULT_DB_DIR: &str = "/usr/share/xt_asn";

/// Runtime overrides for the defaults above
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Largest range table accepted, in bytes
    pub max_table_bytes: usize,
    /// Range database directory
    pub db_dir: PathBuf,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_table_bytes: DEFAULT_MAX_TABLE_BYTES,
            db_dir: PathBuf::from(DEFAULT_DB_DIR),
        }
    }
}

static OVERRIDE_LIMITS: OnceCell<Limits> = OnceCell::new();

/// Largest range table accepted, in bytes
pub fn max_table_bytes() -> usize {
    OVERRIDE_LIMITS
        .get()
        .map_or(DEFAULT_MAX_TABLE_BYTES, |l| l.max_table_bytes)
}

/// Range database directory
pub fn db_dir() -> PathBuf {
    OVERRIDE_LIMITS
        .get()
        .map_or_else(|| PathBuf::from(DEFAULT_DB_DIR), |l| l.db_dir.clone())
}

/// Set the global limits
///
/// Call once at program startup. Returns the rejected value if limits
/// have already been set.
pub fn set_limits(limits: Limits) -> Result<(), Limits> {
    OVERRIDE_LIMITS.set(limits)
}

/// Check if custom limits have been set
pub fn is_custom_limits_set() -> bool {
    OVERRIDE_LIMITS.get().is_some()
}
