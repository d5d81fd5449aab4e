//! Configuration types for ASN match rules

use crate::error::AsnMatchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of ASNs a single rule may reference
pub const MAX_ASNS: usize = 15;

/// Which packet address a rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Match on the source address
    Source,
    /// Match on the destination address
    Destination,
}

impl Direction {
    /// Option name used when saving a rule
    pub fn option_name(self) -> &'static str {
        match self {
            Self::Source => "--source-asn",
            Self::Destination => "--destination-asn",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Source"),
            Self::Destination => write!(f, "Destination"),
        }
    }
}

/// Configuration for one ASN match rule
///
/// The `Display` implementation produces the listing form
/// (` Source ASNs: ! AS64496,AS64497 `); [`RuleConfig::save_format`]
/// produces the form that can be fed back as options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Address inspected by the rule
    pub direction: Direction,
    /// Negate the result
    #[serde(default)]
    pub invert: bool,
    /// ASNs to match, in configured order
    pub asns: Vec<u32>,
}

impl RuleConfig {
    /// Create a new RuleConfig builder
    pub fn builder() -> RuleConfigBuilder {
        RuleConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// Zero and duplicate ASNs are skipped, as [`parse_asn_list`] does, and
    /// dropped at install time. The per-rule limit applies to what is left.
    pub fn validate(&self) -> Result<(), AsnMatchError> {
        let distinct = self.distinct_asns();
        if distinct.is_empty() {
            return Err(AsnMatchError::EmptyAsnList);
        }
        if distinct.len() > MAX_ASNS {
            return Err(AsnMatchError::TooManyAsns {
                count: distinct.len(),
                max: MAX_ASNS,
            });
        }
        Ok(())
    }

    /// The configured ASNs without zero or repeats, first occurrence kept
    pub fn distinct_asns(&self) -> Vec<u32> {
        let mut out: Vec<u32> = Vec::with_capacity(self.asns.len());
        for &asn in &self.asns {
            if asn != 0 && !out.contains(&asn) {
                out.push(asn);
            }
        }
        out
    }

    /// Render the rule as command-line options
    pub fn save_format(&self) -> String {
        let list = self
            .asns
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{} {} {} ",
            if self.invert { " !" } else { "" },
            self.direction.option_name(),
            list
        )
    }
}

impl fmt::Display for RuleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " {} ", self.direction)?;
        write!(f, "{}", if self.asns.len() > 1 { "ASNs: " } else { "ASN: " })?;
        if self.invert {
            write!(f, "! ")?;
        }
        for (i, asn) in self.asns.iter().enumerate() {
            write!(f, "{}AS{}", if i > 0 { "," } else { "" }, asn)?;
        }
        write!(f, " ")
    }
}

/// Builder for RuleConfig
///
/// Exactly one of [`source`](Self::source) or
/// [`destination`](Self::destination) must be called.
#[derive(Debug, Default)]
pub struct RuleConfigBuilder {
    direction: Option<Direction>,
    conflicting: bool,
    invert: bool,
    asns: Vec<u32>,
}

impl RuleConfigBuilder {
    /// Create a new builder with no direction set
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the source address against `asns`
    pub fn source(self, asns: impl IntoIterator<Item = u32>) -> Self {
        self.select(Direction::Source, asns)
    }

    /// Match the destination address against `asns`
    pub fn destination(self, asns: impl IntoIterator<Item = u32>) -> Self {
        self.select(Direction::Destination, asns)
    }

    /// Negate the match result
    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    fn select(mut self, direction: Direction, asns: impl IntoIterator<Item = u32>) -> Self {
        if self.direction.is_some() {
            self.conflicting = true;
        }
        self.direction = Some(direction);
        self.asns = asns.into_iter().collect();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<RuleConfig, AsnMatchError> {
        if self.conflicting {
            return Err(AsnMatchError::ConflictingDirection);
        }
        let direction = self.direction.ok_or(AsnMatchError::MissingDirection)?;
        let mut config = RuleConfig {
            direction,
            invert: self.invert,
            asns: self.asns,
        };
        config.validate()?;
        config.asns = config.distinct_asns();
        Ok(config)
    }
}

/// Parse a comma-separated ASN list such as `15169,AS13335`
///
/// Zero and repeated ASNs are skipped. More than [`MAX_ASNS`] entries is an
/// error, as is a list that leaves nothing to match.
pub fn parse_asn_list(list: &str) -> Result<Vec<u32>, AsnMatchError> {
    let tokens: Vec<&str> = list.split(',').collect();
    if tokens.len() > MAX_ASNS {
        return Err(AsnMatchError::TooManyAsns {
            count: tokens.len(),
            max: MAX_ASNS,
        });
    }

    let mut asns = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = token.trim();
        let digits = token
            .strip_prefix("AS")
            .or_else(|| token.strip_prefix("as"))
            .unwrap_or(token);
        let asn: u32 = digits
            .parse()
            .map_err(|_| AsnMatchError::InvalidAsn(token.to_string()))?;
        if asn != 0 && !asns.contains(&asn) {
            asns.push(asn);
        }
    }

    if asns.is_empty() {
        return Err(AsnMatchError::EmptyAsnList);
    }
    Ok(asns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_asn_list() {
        assert_eq!(parse_asn_list("15169").unwrap(), vec![15169]);
        assert_eq!(
            parse_asn_list("15169, AS13335,as3356").unwrap(),
            vec![15169, 13335, 3356]
        );
        // Duplicates and zero are dropped, order kept
        assert_eq!(
            parse_asn_list("3356,15169,3356,0").unwrap(),
            vec![3356, 15169]
        );
        assert_eq!(parse_asn_list("4294967295").unwrap(), vec![u32::MAX]);
    }

    #[test]
    fn test_parse_asn_list_errors() {
        assert!(matches!(
            parse_asn_list("0"),
            Err(AsnMatchError::EmptyAsnList)
        ));
        assert!(matches!(
            parse_asn_list("AS-bogus"),
            Err(AsnMatchError::InvalidAsn(_))
        ));
        assert!(matches!(
            parse_asn_list("4294967296"),
            Err(AsnMatchError::InvalidAsn(_))
        ));
        assert!(matches!(parse_asn_list(""), Err(AsnMatchError::InvalidAsn(_))));

        let sixteen = (1..=16).map(|n| n.to_string()).collect::<Vec<_>>().join(",");
        match parse_asn_list(&sixteen) {
            Err(AsnMatchError::TooManyAsns { count, max }) => {
                assert_eq!(count, 16);
                assert_eq!(max, MAX_ASNS);
            }
            other => panic!("Expected TooManyAsns, got {:?}", other),
        }

        let fifteen = (1..=15).map(|n| n.to_string()).collect::<Vec<_>>().join(",");
        assert_eq!(parse_asn_list(&fifteen).unwrap().len(), 15);
    }

    #[test]
    fn test_builder() {
        let config = RuleConfig::builder()
            .source([64496, 64497, 64496])
            .invert(true)
            .build()
            .unwrap();
        assert_eq!(config.direction, Direction::Source);
        assert!(config.invert);
        assert_eq!(config.asns, vec![64496, 64497]);
    }

    #[test]
    fn test_builder_direction_errors() {
        let result = RuleConfigBuilder::new()
            .source([1])
            .destination([2])
            .build();
        assert!(matches!(result, Err(AsnMatchError::ConflictingDirection)));

        let result = RuleConfigBuilder::new().invert(true).build();
        assert!(matches!(result, Err(AsnMatchError::MissingDirection)));

        let result = RuleConfigBuilder::new().destination([]).build();
        assert!(matches!(result, Err(AsnMatchError::EmptyAsnList)));
    }

    #[test]
    fn test_validate_counts_distinct_asns() {
        let mut config = RuleConfig {
            direction: Direction::Destination,
            invert: false,
            asns: vec![7; 20],
        };
        assert!(config.validate().is_ok());

        config.asns = (1..=16).collect();
        assert!(matches!(
            config.validate(),
            Err(AsnMatchError::TooManyAsns { count: 16, .. })
        ));

    }

    #[test]
    fn test_zero_asn_skipped_like_parser() {
        let config = RuleConfig {
            direction: Direction::Source,
            invert: false,
            asns: vec![0, 64496, 0],
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.distinct_asns(), vec![64496]);
        assert_eq!(parse_asn_list("0,64496,0").unwrap(), config.distinct_asns());

        let config = RuleConfig::builder().source([0, 64496]).build().unwrap();
        assert_eq!(config.asns, vec![64496]);

        assert!(matches!(
            RuleConfig::builder().source([0]).build(),
            Err(AsnMatchError::EmptyAsnList)
        ));
        assert!(matches!(
            parse_asn_list("0"),
            Err(AsnMatchError::EmptyAsnList)
        ));
    }

    #[test]
    fn test_print_format() {
        let config = RuleConfig::builder()
            .source([64496, 64497])
            .invert(true)
            .build()
            .unwrap();
        assert_eq!(config.to_string(), " Source ASNs: ! AS64496,AS64497 ");

        let config = RuleConfig::builder().destination([13335]).build().unwrap();
        assert_eq!(config.to_string(), " Destination ASN: AS13335 ");
    }

    #[test]
    fn test_save_format() {
        let config = RuleConfig::builder()
            .source([64496, 64497])
            .invert(true)
            .build()
            .unwrap();
        assert_eq!(config.save_format(), " ! --source-asn 64496,64497 ");

        let config = RuleConfig::builder().destination([13335]).build().unwrap();
        assert_eq!(config.save_format(), " --destination-asn 13335 ");
    }

    #[test]
    fn test_json_round_trip() {
        let config = RuleConfig::builder().destination([15169]).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"direction":"destination","invert":false,"asns":[15169]}"#
        );

        let parsed: RuleConfig =
            serde_json::from_str(r#"{"direction":"source","asns":[1,2]}"#).unwrap();
        assert_eq!(parsed.direction, Direction::Source);
        assert!(!parsed.invert);
    }
}
