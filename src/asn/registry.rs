//! Shared, reference-counted registry of ASN range tables
//!
//! Rules hold strong [`TableRef`] handles; the registry only keeps a weak
//! back-reference per `(family, asn)` so it can hand the same table to the
//! next rule that asks for it. A table is freed when its last handle is
//! dropped, so a classifier still holding a handle can never see freed
//! memory.

use super::provider::RangeProvider;
use super::table::RangeTable;
use super::AddressFamily;
use crate::config::limits;
use crate::error::AsnMatchError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Counted handle to a range table
pub type TableRef = Arc<RangeTable>;

/// Per-registry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Largest range table accepted, in bytes
    pub max_table_bytes: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_table_bytes: limits::max_table_bytes(),
        }
    }
}

// Each key has its own slot lock; loading one table does not hold up the rest.
type Slot = Arc<Mutex<Weak<RangeTable>>>;
type FamilyMap = HashMap<u32, Slot>;

/// Thread-safe registry of range tables keyed by address family and ASN
///
/// The outer lock only guards membership and is never held while a table
/// loads. Each `(family, asn)` key has its own slot lock, held for the
/// whole lookup, load and insert of that key. None of these locks are
/// taken while classifying packets.
pub struct Registry {
    provider: Arc<dyn RangeProvider>,
    config: RegistryConfig,
    tables: Mutex<[FamilyMap; 2]>,
}

impl Registry {
    /// Create an empty registry loading tables from `provider`
    pub fn new(provider: Arc<dyn RangeProvider>) -> Self {
        Self::with_config(provider, RegistryConfig::default())
    }

    /// Create an empty registry with explicit settings
    pub fn with_config(provider: Arc<dyn RangeProvider>, config: RegistryConfig) -> Self {
        Self {
            provider,
            config,
            tables: Mutex::new([HashMap::new(), HashMap::new()]),
        }
    }

    /// Settings this registry was created with
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get a handle to the table for `asn`, loading it if needed
    ///
    /// Concurrent callers asking for the same ASN serialize on that key's
    /// slot and always share a single table. Callers for other keys are
    /// not blocked by the load. A failed load leaves the registry
    /// unchanged.
    pub fn acquire(&self, asn: u32, family: AddressFamily) -> Result<TableRef, AsnMatchError> {
        let slot = {
            let mut tables = self.tables.lock().expect("mutex poisoned");
            Arc::clone(tables[family.index()].entry(asn).or_default())
        };

        let result = {
            let mut entry = slot.lock().expect("mutex poisoned");
            if let Some(table) = entry.upgrade() {
                tracing::debug!(
                    "Reusing AS{} {} table ({} references)",
                    asn,
                    family,
                    Arc::strong_count(&table)
                );
                return Ok(table);
            }

            let loaded = self.load(asn, family);
            if let Ok(table) = &loaded {
                *entry = Arc::downgrade(table);
            }
            loaded
        };

        if result.is_err() {
            drop(slot);
            self.prune(family);
        }
        result
    }

    fn load(&self, asn: u32, family: AddressFamily) -> Result<TableRef, AsnMatchError> {
        let max_bytes = self.config.max_table_bytes;
        let raw = self.provider.fetch(asn, family, max_bytes)?;
        let table = Arc::new(RangeTable::from_raw(asn, family, &raw, max_bytes)?);
        tracing::debug!("Loaded AS{} {} table with {} ranges", asn, family, table.len());
        Ok(table)
    }

    /// Give back a handle obtained from [`acquire`](Self::acquire)
    ///
    /// When this was the last handle the table is freed, and its entry is
    /// unlinked together with any other entry whose table is gone.
    pub fn release(&self, table: TableRef) {
        let (asn, family) = (table.asn(), table.family());
        let weak = Arc::downgrade(&table);
        drop(table);
        if weak.strong_count() == 0 {
            tracing::debug!("Freed AS{} {} table", asn, family);
            self.prune(family);
        }
    }

    // Drop entries with no live table. A slot cloned by an in-flight
    // acquire is skipped; new clones need the outer lock held here.
    fn prune(&self, family: AddressFamily) {
        let mut tables = self.tables.lock().expect("mutex poisoned");
        tables[family.index()].retain(|_, slot| Arc::strong_count(slot) > 1 || is_live(slot));
    }

    /// Number of live handles to the table for `asn`, or 0 if none
    pub fn reference_count(&self, asn: u32, family: AddressFamily) -> usize {
        let slot = {
            let tables = self.tables.lock().expect("mutex poisoned");
            tables[family.index()].get(&asn).map(Arc::clone)
        };
        slot.map_or(0, |slot| slot.lock().expect("mutex poisoned").strong_count())
    }

    /// Check whether a live table for `asn` is registered
    pub fn contains(&self, asn: u32, family: AddressFamily) -> bool {
        self.reference_count(asn, family) > 0
    }

    /// Number of live tables registered for `family`
    pub fn len(&self, family: AddressFamily) -> usize {
        let slots: Vec<Slot> = {
            let tables = self.tables.lock().expect("mutex poisoned");
            tables[family.index()].values().cloned().collect()
        };
        slots.iter().filter(|slot| is_live(slot)).count()
    }

    /// Check whether no live tables are registered in any family
    pub fn is_empty(&self) -> bool {
        self.len(AddressFamily::Ipv4) == 0 && self.len(AddressFamily::Ipv6) == 0
    }

    /// Number of map entries for `family`, live or not
    #[cfg(test)]
    fn entries(&self, family: AddressFamily) -> usize {
        self.tables.lock().expect("mutex poisoned")[family.index()].len()
    }

    /// Tear the registry down
    ///
    /// Returns the number of tables still referenced by some rule. Those
    /// tables stay valid for their holders and are freed when the last
    /// handle drops.
    pub fn shutdown(self) -> usize {
        let tables = self
            .tables
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let remnants = tables
            .iter()
            .flat_map(HashMap::values)
            .filter(|slot| is_live(slot))
            .count();
        if remnants > 0 {
            tracing::warn!("Registry shut down with {} range tables still in use", remnants);
        }
        remnants
    }
}

fn is_live(slot: &Slot) -> bool {
    slot.lock().expect("mutex poisoned").strong_count() > 0
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("ipv4_tables", &self.len(AddressFamily::Ipv4))
            .field("ipv6_tables", &self.len(AddressFamily::Ipv6))
            .finish_non_exhaustive()
    }
}
