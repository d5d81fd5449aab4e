//! Immutable, sorted address range tables for a single ASN

use super::provider::RawRanges;
use super::AddressFamily;
use crate::error::AsnMatchError;
use ipnet::{Ipv4Net, Ipv6Net};
use std::fmt::Debug;
use std::net::{Ipv4Addr, Ipv6Addr};

/// An inclusive `{begin, end}` address interval
pub trait AddressRange {
    /// Ordered numeric form of an address
    type Addr: Ord + Copy + Debug;

    /// First address in the range
    fn begin(&self) -> Self::Addr;

    /// Last address in the range (inclusive)
    fn end(&self) -> Self::Addr;
}

/// Inclusive IPv4 range in host-order numeric form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Range {
    /// First address
    pub begin: u32,
    /// Last address
    pub end: u32,
}

impl Ipv4Range {
    /// Create a range covering `begin..=end`
    pub fn new(begin: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self {
            begin: u32::from(begin),
            end: u32::from(end),
        }
    }

    fn from_record(record: &[u8]) -> Self {
        Self {
            begin: word(record, 0),
            end: word(record, 1),
        }
    }

    pub(crate) fn write_record(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.begin.to_ne_bytes());
        out.extend_from_slice(&self.end.to_ne_bytes());
    }
}

impl From<Ipv4Net> for Ipv4Range {
    fn from(net: Ipv4Net) -> Self {
        Self::new(net.network(), net.broadcast())
    }
}

impl AddressRange for Ipv4Range {
    type Addr = u32;

    fn begin(&self) -> u32 {
        self.begin
    }

    fn end(&self) -> u32 {
        self.end
    }
}

/// Inclusive IPv6 range as four host-order 32-bit words per bound
///
/// Words are kept in address order, so comparing the arrays
/// lexicographically orders them the same way as the 128-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Range {
    /// First address
    pub begin: [u32; 4],
    /// Last address
    pub end: [u32; 4],
}

impl Ipv6Range {
    /// Create a range covering `begin..=end`
    pub fn new(begin: Ipv6Addr, end: Ipv6Addr) -> Self {
        Self {
            begin: ipv6_words(&begin),
            end: ipv6_words(&end),
        }
    }

    fn from_record(record: &[u8]) -> Self {
        Self {
            begin: [
                word(record, 0),
                word(record, 1),
                word(record, 2),
                word(record, 3),
            ],
            end: [
                word(record, 4),
                word(record, 5),
                word(record, 6),
                word(record, 7),
            ],
        }
    }

    pub(crate) fn write_record(&self, out: &mut Vec<u8>) {
        for w in self.begin.iter().chain(self.end.iter()) {
            out.extend_from_slice(&w.to_ne_bytes());
        }
    }
}

impl From<Ipv6Net> for Ipv6Range {
    fn from(net: Ipv6Net) -> Self {
        Self::new(net.network(), net.broadcast())
    }
}

impl AddressRange for Ipv6Range {
    type Addr = [u32; 4];

    fn begin(&self) -> [u32; 4] {
        self.begin
    }

    fn end(&self) -> [u32; 4] {
        self.end
    }
}

/// Split an IPv6 address (network byte order) into host-order words
pub fn ipv6_words(addr: &Ipv6Addr) -> [u32; 4] {
    let o = addr.octets();
    [
        u32::from_be_bytes([o[0], o[1], o[2], o[3]]),
        u32::from_be_bytes([o[4], o[5], o[6], o[7]]),
        u32::from_be_bytes([o[8], o[9], o[10], o[11]]),
        u32::from_be_bytes([o[12], o[13], o[14], o[15]]),
    ]
}

// Records are native-endian; callers slice with chunks_exact so the index is in bounds.
fn word(record: &[u8], i: usize) -> u32 {
    let at = i * 4;
    u32::from_ne_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

/// Sorted ranges of one address family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ranges {
    /// IPv4 ranges
    V4(Vec<Ipv4Range>),
    /// IPv6 ranges
    V6(Vec<Ipv6Range>),
}

/// Address ranges announced by one ASN in one address family
///
/// The range data never changes after construction, so any number of
/// threads may search a table concurrently without synchronization.
/// Ranges must be sorted ascending by `begin` and must not overlap;
/// construction trusts the data provider on this and does not re-sort.
#[derive(Debug)]
pub struct RangeTable {
    asn: u32,
    ranges: Ranges,
}

impl RangeTable {
    /// Build a table from raw provider data
    ///
    /// The size of the declared record count is checked against
    /// `max_bytes` before anything is allocated, and the buffer must be
    /// exactly `count` records long.
    pub fn from_raw(
        asn: u32,
        family: AddressFamily,
        raw: &RawRanges,
        max_bytes: usize,
    ) -> Result<Self, AsnMatchError> {
        let expected = raw
            .count
            .checked_mul(family.record_size())
            .filter(|&bytes| bytes <= max_bytes)
            .ok_or(AsnMatchError::SizeRejected {
                asn,
                family,
                count: raw.count,
                limit: max_bytes,
            })?;

        if raw.bytes.len() != expected {
            return Err(AsnMatchError::CorruptData {
                asn,
                family,
                len: raw.bytes.len(),
                expected,
            });
        }

        let ranges = match family {
            AddressFamily::Ipv4 => Ranges::V4(decode(asn, &raw.bytes, Ipv4Range::from_record)?),
            AddressFamily::Ipv6 => Ranges::V6(decode(asn, &raw.bytes, Ipv6Range::from_record)?),
        };
        Ok(Self { asn, ranges })
    }

    /// Build an IPv4 table from already decoded ranges
    pub fn from_v4(asn: u32, ranges: Vec<Ipv4Range>) -> Self {
        Self {
            asn,
            ranges: Ranges::V4(ranges),
        }
    }

    /// Build an IPv6 table from already decoded ranges
    pub fn from_v6(asn: u32, ranges: Vec<Ipv6Range>) -> Self {
        Self {
            asn,
            ranges: Ranges::V6(ranges),
        }
    }

    /// ASN this table belongs to
    pub fn asn(&self) -> u32 {
        self.asn
    }

    /// Address family of the ranges
    pub fn family(&self) -> AddressFamily {
        match self.ranges {
            Ranges::V4(_) => AddressFamily::Ipv4,
            Ranges::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// The ranges, in the order the provider supplied them
    pub fn ranges(&self) -> &Ranges {
        &self.ranges
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        match &self.ranges {
            Ranges::V4(r) => r.len(),
            Ranges::V6(r) => r.len(),
        }
    }

    /// Whether the table has no ranges (and so never matches)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every range is well formed and that ranges are sorted
    /// and disjoint
    ///
    /// This is O(n) and is not run on construction or on the packet path.
    pub fn is_consistent(&self) -> bool {
        match &self.ranges {
            Ranges::V4(r) => sorted_disjoint(r),
            Ranges::V6(r) => sorted_disjoint(r),
        }
    }
}

fn sorted_disjoint<R: AddressRange>(ranges: &[R]) -> bool {
    ranges.iter().all(|r| r.begin() <= r.end())
        && ranges.windows(2).all(|w| w[0].end() < w[1].begin())
}

fn decode<R>(asn: u32, bytes: &[u8], parse: fn(&[u8]) -> R) -> Result<Vec<R>, AsnMatchError>
where
    R: AddressRange,
{
    let record = std::mem::size_of::<R>();
    let mut ranges = Vec::new();
    ranges
        .try_reserve_exact(bytes.len() / record)
        .map_err(|_| AsnMatchError::ResourceExhausted {
            asn,
            bytes: bytes.len(),
        })?;
    ranges.extend(bytes.chunks_exact(record).map(parse));
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4_raw(ranges: &[(u32, u32)]) -> RawRanges {
        let ranges: Vec<Ipv4Range> = ranges
            .iter()
            .map(|&(begin, end)| Ipv4Range { begin, end })
            .collect();
        RawRanges::from_v4(&ranges)
    }

    #[test]
    fn test_record_sizes_match_layout() {
        assert_eq!(
            std::mem::size_of::<Ipv4Range>(),
            AddressFamily::Ipv4.record_size()
        );
        assert_eq!(
            std::mem::size_of::<Ipv6Range>(),
            AddressFamily::Ipv6.record_size()
        );
    }

    #[test]
    fn test_from_raw_preserves_order() {
        let raw = v4_raw(&[(10, 20), (30, 40), (100, 200)]);
        let table = RangeTable::from_raw(64496, AddressFamily::Ipv4, &raw, usize::MAX).unwrap();

        assert_eq!(table.asn(), 64496);
        assert_eq!(table.family(), AddressFamily::Ipv4);
        assert_eq!(
            table.ranges(),
            &Ranges::V4(vec![
                Ipv4Range { begin: 10, end: 20 },
                Ipv4Range { begin: 30, end: 40 },
                Ipv4Range {
                    begin: 100,
                    end: 200
                },
            ])
        );
        assert!(table.is_consistent());
    }

    #[test]
    fn test_from_raw_v6() {
        let range = Ipv6Range::new(
            "2001:db8::".parse().unwrap(),
            "2001:db8::ffff".parse().unwrap(),
        );
        let raw = RawRanges::from_v6(&[range]);
        assert_eq!(raw.bytes.len(), 32);

        let table = RangeTable::from_raw(64497, AddressFamily::Ipv6, &raw, usize::MAX).unwrap();
        assert_eq!(table.family(), AddressFamily::Ipv6);
        assert_eq!(table.ranges(), &Ranges::V6(vec![range]));
    }

    #[test]
    fn test_zero_count_is_empty_table() {
        let raw = RawRanges {
            bytes: Vec::new(),
            count: 0,
        };
        let table = RangeTable::from_raw(1, AddressFamily::Ipv6, &raw, usize::MAX).unwrap();
        assert!(table.is_empty());
        assert!(table.is_consistent());
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        let mut raw = v4_raw(&[(1, 2), (3, 4)]);
        raw.bytes.pop();

        match RangeTable::from_raw(7, AddressFamily::Ipv4, &raw, usize::MAX) {
            Err(AsnMatchError::CorruptData { len, expected, .. }) => {
                assert_eq!(len, 15);
                assert_eq!(expected, 16);
            }
            other => panic!("Expected CorruptData, got {:?}", other),
        }
    }

    #[test]
    fn test_v4_bytes_under_v6_family_is_corrupt() {
        let raw = v4_raw(&[(1, 2), (3, 4)]);
        let result = RangeTable::from_raw(7, AddressFamily::Ipv6, &raw, usize::MAX);
        assert!(matches!(result, Err(AsnMatchError::CorruptData { .. })));
    }

    #[test]
    fn test_overflowing_count_rejected() {
        let raw = RawRanges {
            bytes: Vec::new(),
            count: usize::MAX / 4,
        };
        match RangeTable::from_raw(9, AddressFamily::Ipv4, &raw, usize::MAX) {
            Err(AsnMatchError::SizeRejected { count, .. }) => assert_eq!(count, usize::MAX / 4),
            other => panic!("Expected SizeRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_count_above_limit_rejected() {
        let raw = v4_raw(&[(1, 2), (3, 4)]);
        let result = RangeTable::from_raw(9, AddressFamily::Ipv4, &raw, 8);
        assert!(matches!(
            result,
            Err(AsnMatchError::SizeRejected { limit: 8, .. })
        ));
    }

    #[test]
    fn test_consistency_check() {
        let overlapping = RangeTable::from_v4(
            1,
            vec![
                Ipv4Range { begin: 10, end: 30 },
                Ipv4Range { begin: 20, end: 40 },
            ],
        );
        assert!(!overlapping.is_consistent());

        let inverted = RangeTable::from_v4(1, vec![Ipv4Range { begin: 50, end: 10 }]);
        assert!(!inverted.is_consistent());

        let unsorted = RangeTable::from_v4(
            1,
            vec![
                Ipv4Range { begin: 50, end: 60 },
                Ipv4Range { begin: 10, end: 20 },
            ],
        );
        assert!(!unsorted.is_consistent());
    }

    #[test]
    fn test_ipv6_words_are_host_order() {
        let addr: Ipv6Addr = "2001:db8:1:2:3:4:5:6".parse().unwrap();
        assert_eq!(
            ipv6_words(&addr),
            [0x2001_0db8, 0x0001_0002, 0x0003_0004, 0x0005_0006]
        );
    }

    #[test]
    fn test_range_from_cidr() {
        let net: Ipv4Net = "192.0.2.0/24".parse().unwrap();
        let range = Ipv4Range::from(net);
        assert_eq!(range.begin, u32::from(Ipv4Addr::new(192, 0, 2, 0)));
        assert_eq!(range.end, u32::from(Ipv4Addr::new(192, 0, 2, 255)));
    }
}
