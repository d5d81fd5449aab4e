//! Sources of raw range data
//!
//! A provider hands out the packed `{begin, end}` records for one ASN and
//! address family. The registry turns them into a [`RangeTable`] the first
//! time a rule asks for that ASN.
//!
//! [`RangeTable`]: super::RangeTable

use super::table::{Ipv4Range, Ipv6Range};
use super::AddressFamily;
use crate::config::limits;
use crate::error::AsnMatchError;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Packed range records as supplied by a provider
///
/// IPv4 records are two native-endian `u32` values. IPv6 records are the
/// begin and end addresses, each as four native-endian `u32` words in
/// address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRanges {
    /// Packed records
    pub bytes: Vec<u8>,
    /// Declared number of records
    pub count: usize,
}

impl RawRanges {
    /// Pack IPv4 ranges into records
    pub fn from_v4(ranges: &[Ipv4Range]) -> Self {
        let mut bytes = Vec::with_capacity(ranges.len() * AddressFamily::Ipv4.record_size());
        for range in ranges {
            range.write_record(&mut bytes);
        }
        Self {
            bytes,
            count: ranges.len(),
        }
    }

    /// Pack IPv6 ranges into records
    pub fn from_v6(ranges: &[Ipv6Range]) -> Self {
        let mut bytes = Vec::with_capacity(ranges.len() * AddressFamily::Ipv6.record_size());
        for range in ranges {
            range.write_record(&mut bytes);
        }
        Self {
            bytes,
            count: ranges.len(),
        }
    }
}

/// Supplies raw range data for an ASN
///
/// Implementations must return records sorted ascending and
/// non-overlapping; the registry does not re-sort them.
pub trait RangeProvider: Send + Sync {
    /// Fetch the records for `asn` in `family`
    ///
    /// Returns [`AsnMatchError::DataUnavailable`] when there is no record
    /// for this ASN. Providers that have to read or allocate the data
    /// must return [`AsnMatchError::SizeRejected`] instead of doing so
    /// when it would take more than `max_bytes`.
    fn fetch(
        &self,
        asn: u32,
        family: AddressFamily,
        max_bytes: usize,
    ) -> Result<RawRanges, AsnMatchError>;
}

/// Reads range databases laid out as `<root>/<LE|BE>/<asn>.<iv4|iv6>`
///
/// The `LE` or `BE` subdirectory is picked to match the byte order of the
/// running machine, since records are stored as native integers.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    /// Create a provider reading from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Database root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the database file for `asn` in `family`
    pub fn path_for(&self, asn: u32, family: AddressFamily) -> PathBuf {
        let order = if cfg!(target_endian = "big") { "BE" } else { "LE" };
        self.root
            .join(order)
            .join(format!("{asn}.{}", family.extension()))
    }
}

impl Default for DirectoryProvider {
    fn default() -> Self {
        Self::new(limits::db_dir())
    }
}

impl RangeProvider for DirectoryProvider {
    fn fetch(
        &self,
        asn: u32,
        family: AddressFamily,
        max_bytes: usize,
    ) -> Result<RawRanges, AsnMatchError> {
        let path = self.path_for(asn, family);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No database file at {}", path.display());
                return Err(AsnMatchError::DataUnavailable { asn, family });
            }
            Err(source) => return Err(AsnMatchError::Io { path, source }),
        };
        let len = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(source) => return Err(AsnMatchError::Io { path, source }),
        };

        // Size is checked from metadata, before anything is read.
        let record = family.record_size();
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= max_bytes)
            .ok_or(AsnMatchError::SizeRejected {
                asn,
                family,
                count: usize::try_from(len / record as u64).unwrap_or(usize::MAX),
                limit: max_bytes,
            })?;

        if len % record != 0 {
            return Err(AsnMatchError::CorruptData {
                asn,
                family,
                len,
                expected: len - len % record,
            });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| AsnMatchError::ResourceExhausted { asn, bytes: len })?;
        // A file that changed size since the metadata call fails the
        // length check when the table is built.
        if let Err(source) = file.take(len as u64).read_to_end(&mut bytes) {
            return Err(AsnMatchError::Io { path, source });
        }

        Ok(RawRanges {
            bytes,
            count: len / record,
        })
    }
}

/// In-memory provider, mainly for tests and embedding
///
/// Counts every fetch so callers can check how many tables were built.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    records: HashMap<(AddressFamily, u32), RawRanges>,
    fetches: AtomicUsize,
}

impl MemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw records, replacing any previous entry
    pub fn insert_raw(&mut self, asn: u32, family: AddressFamily, raw: RawRanges) {
        self.records.insert((family, asn), raw);
    }

    /// Store IPv4 ranges for `asn`
    pub fn insert_v4(&mut self, asn: u32, ranges: &[Ipv4Range]) {
        self.insert_raw(asn, AddressFamily::Ipv4, RawRanges::from_v4(ranges));
    }

    /// Store IPv6 ranges for `asn`
    pub fn insert_v6(&mut self, asn: u32, ranges: &[Ipv6Range]) {
        self.insert_raw(asn, AddressFamily::Ipv6, RawRanges::from_v6(ranges));
    }

    /// Store the networks announced by `asn`
    ///
    /// Networks are aggregated per family first, which sorts them and
    /// folds overlapping prefixes together.
    pub fn insert_networks(&mut self, asn: u32, networks: &[IpNet]) {
        let mut v4 = Vec::new();
        let mut v6 = Vec::new();
        for net in networks {
            match net {
                IpNet::V4(n) => v4.push(*n),
                IpNet::V6(n) => v6.push(*n),
            }
        }

        if !v4.is_empty() {
            let ranges: Vec<Ipv4Range> = Ipv4Net::aggregate(&v4)
                .into_iter()
                .map(Ipv4Range::from)
                .collect();
            self.insert_v4(asn, &ranges);
        }
        if !v6.is_empty() {
            let ranges: Vec<Ipv6Range> = Ipv6Net::aggregate(&v6)
                .into_iter()
                .map(Ipv6Range::from)
                .collect();
            self.insert_v6(asn, &ranges);
        }
    }

    /// Builder-style [`insert_networks`](Self::insert_networks)
    pub fn with_networks(mut self, asn: u32, networks: &[IpNet]) -> Self {
        self.insert_networks(asn, networks);
        self
    }

    /// Number of successful and failed fetches so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RangeProvider for MemoryProvider {
    // Records already live in memory; the registry checks the size.
    fn fetch(
        &self,
        asn: u32,
        family: AddressFamily,
        _max_bytes: usize,
    ) -> Result<RawRanges, AsnMatchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.records
            .get(&(family, asn))
            .cloned()
            .ok_or(AsnMatchError::DataUnavailable { asn, family })
    }
}
