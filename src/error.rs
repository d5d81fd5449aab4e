//! Error types for ASN rule installation and range table construction

use crate::asn::AddressFamily;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while configuring a rule or loading its range tables
///
/// Errors are only ever produced on the install path. Packet evaluation
/// never fails; see [`crate::classify`].
#[derive(Debug, Error)]
pub enum AsnMatchError {
    /// The rule does not name any usable ASN
    #[error("no ASN numbers specified")]
    EmptyAsnList,

    /// The rule names more ASNs than a single rule can hold
    #[error("too many ASN numbers specified ({count}, at most {max})")]
    TooManyAsns {
        /// Number of ASNs supplied
        count: usize,
        /// Maximum number accepted per rule
        max: usize,
    },

    /// An ASN token could not be parsed as a 32-bit number
    #[error("invalid ASN number: {0:?}")]
    InvalidAsn(String),

    /// Both a source and a destination ASN list were given
    #[error("only exactly one of --source-asn or --destination-asn must be specified")]
    ConflictingDirection,

    /// Neither a source nor a destination ASN list was given
    #[error("missing arguments: one of --source-asn or --destination-asn is required")]
    MissingDirection,

    /// Raw range data does not line up with the declared record count
    #[error("range data for AS{asn} ({family}) seems to be corrupted: {len} bytes, expected {expected}")]
    CorruptData {
        /// ASN the data was supplied for
        asn: u32,
        /// Address family of the data
        family: AddressFamily,
        /// Length of the supplied buffer
        len: usize,
        /// Length implied by the declared record count
        expected: usize,
    },

    /// The declared record count would need an oversized or overflowing allocation
    ///
    /// Raised before anything is allocated.
    #[error("range data for AS{asn} ({family}) rejected: {count} records exceed the {limit} byte limit")]
    SizeRejected {
        /// ASN the data was supplied for
        asn: u32,
        /// Address family of the data
        family: AddressFamily,
        /// Declared record count
        count: usize,
        /// Maximum table size in bytes
        limit: usize,
    },

    /// The data provider has no record for this ASN
    #[error("no range data available for AS{asn} ({family})")]
    DataUnavailable {
        /// Requested ASN
        asn: u32,
        /// Requested address family
        family: AddressFamily,
    },

    /// Memory for the range table could not be reserved
    #[error("insufficient memory for AS{asn} range table ({bytes} bytes)")]
    ResourceExhausted {
        /// ASN whose table was being built
        asn: u32,
        /// Size of the failed reservation
        bytes: usize,
    },

    /// Reading a database file failed
    #[error("could not read {}: {source}", path.display())]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
