//! Rule configuration and global limits

pub mod limits;
pub mod rule;

pub use limits::Limits;
pub use rule::{parse_asn_list, Direction, RuleConfig, RuleConfigBuilder, MAX_ASNS};
