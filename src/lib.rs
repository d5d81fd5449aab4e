//! asnmatch - ASN address-range matching for packet filters
//!
//! This library keeps a shared registry of per-ASN address range tables
//! and classifies packet addresses against them. Rules bind their ASN list
//! to registry tables once at install time; per-packet evaluation then
//! works on those bindings alone, without locks.
//!
//! ```
//! use asnmatch::{AddressFamily, Ipv4Range, MemoryProvider, Registry, Rule, RuleConfig};
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! let mut provider = MemoryProvider::new();
//! provider.insert_v4(
//!     64496,
//!     &[Ipv4Range::new(Ipv4Addr::new(192, 0, 2, 0), Ipv4Addr::new(192, 0, 2, 255))],
//! );
//! let registry = Registry::new(Arc::new(provider));
//!
//! let config = RuleConfig::builder().source([64496]).build()?;
//! let rule = Rule::install(&registry, config, AddressFamily::Ipv4)?;
//!
//! let src: IpAddr = "192.0.2.10".parse()?;
//! let dst: IpAddr = "198.51.100.1".parse()?;
//! assert!(rule.matches(src, dst));
//!
//! rule.teardown(&registry);
//! assert!(registry.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod asn;
pub mod classify;
pub mod config;
pub mod error;
pub mod rule;

// Re-export core types for library users
pub use asn::{
    AddressFamily, DirectoryProvider, Ipv4Range, Ipv6Range, MemoryProvider, RangeProvider,
    RangeTable, RawRanges, Registry, RegistryConfig, TableRef,
};
pub use classify::{contains, matches};
pub use config::{parse_asn_list, Direction, RuleConfig, RuleConfigBuilder, MAX_ASNS};
pub use error::AsnMatchError;
pub use rule::Rule;
