//! ASN range tables and the registry that shares them between rules

pub mod provider;
pub mod registry;
pub mod table;

pub use provider::{DirectoryProvider, MemoryProvider, RangeProvider, RawRanges};
pub use registry::{Registry, RegistryConfig, TableRef};
pub use table::{AddressRange, Ipv4Range, Ipv6Range, RangeTable, Ranges};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Address family a range table covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// 32-bit IPv4 addresses
    Ipv4,
    /// 128-bit IPv6 addresses
    Ipv6,
}

impl AddressFamily {
    /// Size in bytes of one `{begin, end}` record in raw range data
    pub const fn record_size(self) -> usize {
        match self {
            Self::Ipv4 => 8,
            Self::Ipv6 => 32,
        }
    }

    /// File extension used by the range database for this family
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Ipv4 => "iv4",
            Self::Ipv6 => "iv6",
        }
    }

    /// Family of the given address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Ipv4 => 0,
            Self::Ipv6 => 1,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
        }
    }
}
