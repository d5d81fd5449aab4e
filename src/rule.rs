//! Installed rules and their range table bindings

use crate::asn::{AddressFamily, Registry, TableRef};
use crate::config::{Direction, RuleConfig};
use crate::error::AsnMatchError;

/// A rule whose ASN list has been bound to registry tables
///
/// Created by [`Rule::install`] and given back with [`Rule::teardown`].
/// `handles[i]` belongs to `asns()[i]`.
#[derive(Debug)]
pub struct Rule {
    config: RuleConfig,
    family: AddressFamily,
    handles: Vec<Option<TableRef>>,
}

impl Rule {
    /// Validate `config` and acquire a table for each distinct ASN
    ///
    /// Installation is all or nothing: if any ASN cannot be loaded, every
    /// table already acquired for this rule is released before the error
    /// is returned.
    pub fn install(
        registry: &Registry,
        config: RuleConfig,
        family: AddressFamily,
    ) -> Result<Self, AsnMatchError> {
        config.validate()?;
        let asns = config.distinct_asns();

        let mut handles = Vec::with_capacity(asns.len());
        for &asn in &asns {
            match registry.acquire(asn, family) {
                Ok(table) => handles.push(Some(table)),
                Err(e) => {
                    tracing::warn!("Unable to load AS{} into memory: {}", asn, e);
                    for table in handles.into_iter().flatten() {
                        registry.release(table);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            config: RuleConfig { asns, ..config },
            family,
            handles,
        })
    }

    /// Release every table this rule holds
    pub fn teardown(self, registry: &Registry) {
        for (asn, handle) in self.config.asns.iter().zip(self.handles) {
            match handle {
                Some(table) => registry.release(table),
                None => tracing::error!(
                    "No range table was bound for AS{} at teardown; please report this bug",
                    asn
                ),
            }
        }
    }

    /// The rule's configuration, with duplicate ASNs removed
    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Address inspected by the rule
    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    /// Whether the match result is negated
    pub fn is_inverted(&self) -> bool {
        self.config.invert
    }

    /// Address family the rule was installed for
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// ASNs bound by this rule, in configured order
    pub fn asns(&self) -> &[u32] {
        &self.config.asns
    }

    /// Table handles, parallel to [`asns`](Self::asns)
    pub fn handles(&self) -> &[Option<TableRef>] {
        &self.handles
    }

    /// Unbind the table at `index`, simulating a binding lost to a bug
    #[cfg(test)]
    pub(crate) fn detach(&mut self, index: usize) -> Option<TableRef> {
        self.handles.get_mut(index).and_then(Option::take)
    }
}
