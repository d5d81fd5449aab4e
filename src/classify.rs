//! Per-packet classification against bound range tables
//!
//! Everything here is lock-free and allocation-free: rules already hold
//! counted handles to immutable tables, so any number of threads can
//! classify concurrently while other rules are installed or torn down.
//! Nothing in this module returns an error. Corrupt tables and missing
//! bindings are logged and count as "no match".

use crate::asn::table::ipv6_words;
use crate::asn::{AddressRange, RangeTable, Ranges};
use crate::config::Direction;
use crate::rule::Rule;
use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Outcome of a binary search over one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Some range contains the address
    Found,
    /// No range contains the address
    NotFound,
    /// The range at this index is malformed (`begin > end`), so the
    /// table's ordering cannot be trusted
    Corrupt(usize),
}

/// Binary search for `addr` in ranges sorted ascending and disjoint
pub fn search<R: AddressRange>(ranges: &[R], addr: R::Addr) -> Probe {
    let (mut lo, mut hi) = (0, ranges.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let (begin, end) = (ranges[mid].begin(), ranges[mid].end());
        if begin > end {
            return Probe::Corrupt(mid);
        }
        match (addr.cmp(&begin), addr.cmp(&end)) {
            (Ordering::Less, _) => hi = mid,
            (_, Ordering::Greater) => lo = mid + 1,
            _ => return Probe::Found,
        }
    }
    Probe::NotFound
}

/// Check whether `table` contains `addr`
///
/// An address of the other family never matches.
pub fn contains(table: &RangeTable, addr: IpAddr) -> bool {
    let probe = match (table.ranges(), addr) {
        (Ranges::V4(ranges), IpAddr::V4(a)) => search(ranges, u32::from(a)),
        (Ranges::V6(ranges), IpAddr::V6(a)) => search(ranges, ipv6_words(&a)),
        _ => return false,
    };

    match probe {
        Probe::Found => true,
        Probe::NotFound => false,
        Probe::Corrupt(index) => {
            tracing::error!(
                "AS{} {} table is corrupt at range {}; treating as no match",
                table.asn(),
                table.family(),
                index
            );
            false
        }
    }
}

impl RangeTable {
    /// Check whether this table contains `addr`; see [`contains`]
    pub fn contains(&self, addr: IpAddr) -> bool {
        contains(self, addr)
    }
}

/// Evaluate `rule` against a packet's addresses
///
/// The address picked by the rule's direction is checked against each
/// bound table in turn, stopping at the first hit. The result is negated
/// for inverted rules.
pub fn matches(rule: &Rule, src: IpAddr, dst: IpAddr) -> bool {
    let addr = match rule.direction() {
        Direction::Source => src,
        Direction::Destination => dst,
    };

    let hit = rule
        .asns()
        .iter()
        .zip(rule.handles())
        .any(|(asn, handle)| match handle {
            Some(table) => contains(table, addr),
            None => {
                tracing::warn!("AS{} isn't loaded into memory, skipping it", asn);
                false
            }
        });

    hit != rule.is_inverted()
}

impl Rule {
    /// Evaluate this rule against a packet; see [`matches`]
    pub fn matches(&self, src: IpAddr, dst: IpAddr) -> bool {
        matches(self, src, dst)
    }
}

/// Unspecified address of the same family as `addr`
///
/// Handy for filling the address a rule does not inspect.
pub fn unspecified_like(addr: &IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}
