//! asnmatch - match addresses against ASN range tables.
//!
//! This is the command-line interface for the asnmatch library.

#![allow(clippy::uninlined_format_args)]

use anyhow::{bail, Result};
use asnmatch::classify::unspecified_like;
use asnmatch::config::limits::{DEFAULT_DB_DIR, DEFAULT_MAX_TABLE_BYTES};
use asnmatch::{
    parse_asn_list, AddressFamily, Direction, DirectoryProvider, Registry, RegistryConfig, Rule,
    RuleConfig,
};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the match tool.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Match IP addresses against ASN range tables", long_about = None)]
#[clap(group(
    clap::ArgGroup::new("direction")
        .required(true)
        .args(["src_asn", "dst_asn"])
))]
struct Args {
    /// Match addresses coming from (one of) the specified ASN(s)
    #[clap(long, visible_alias = "source-asn", value_name = "ASN[,ASN...]")]
    src_asn: Option<String>,

    /// Match addresses going to (one of) the specified ASN(s)
    #[clap(long, visible_alias = "destination-asn", value_name = "ASN[,ASN...]")]
    dst_asn: Option<String>,

    /// Negate the match
    #[clap(long)]
    invert: bool,

    /// Address family of the rule (default: family of the first address)
    #[clap(long, value_enum)]
    family: Option<FamilyArg>,

    /// Range database directory
    #[clap(long, default_value = DEFAULT_DB_DIR)]
    db_dir: PathBuf,

    /// Largest range table to load, in bytes
    #[clap(long)]
    max_table_bytes: Option<usize>,

    /// Print the rule as options instead of the listing form
    #[clap(long)]
    save: bool,

    /// Output results in JSON format
    #[clap(long)]
    json: bool,

    /// Enable verbose logging (use -vv for debug)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Addresses to check
    addresses: Vec<IpAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum FamilyArg {
    Ipv4,
    Ipv6,
}

/// JSON output structure for one checked address
#[derive(Debug, serde::Serialize)]
struct JsonResult {
    address: String,
    matched: bool,
}

/// JSON output structure for the whole run
#[derive(Debug, serde::Serialize)]
struct JsonOutput {
    version: String,
    family: AddressFamily,
    rule: RuleConfig,
    results: Vec<JsonResult>,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install a `tracing` subscriber; `RUST_LOG` wins over `-v`
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let config = rule_config(args)?;
    let family = resolve_family(args.family, &args.addresses)?;

    let registry = registry(args);
    let rule = Rule::install(&registry, config, family)?;

    let results: Vec<(IpAddr, bool)> = args
        .addresses
        .iter()
        .map(|&addr| {
            let (src, dst) = packet_for(rule.direction(), addr);
            (addr, rule.matches(src, dst))
        })
        .collect();

    if args.json {
        let output = JsonOutput {
            version: env!("CARGO_PKG_VERSION").to_string(),
            family,
            rule: rule.config().clone(),
            results: results
                .iter()
                .map(|(addr, matched)| JsonResult {
                    address: addr.to_string(),
                    matched: *matched,
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        if args.save {
            println!("{}", rule.config().save_format().trim_end());
        } else {
            println!("{}", rule.config().to_string().trim_end());
        }
        for (addr, matched) in &results {
            println!("{} {}", addr, if *matched { "match" } else { "no match" });
        }
    }

    rule.teardown(&registry);
    registry.shutdown();
    Ok(())
}

/// Build the rule configuration from the direction flags
fn rule_config(args: &Args) -> Result<RuleConfig> {
    let mut builder = RuleConfig::builder().invert(args.invert);
    if let Some(list) = &args.src_asn {
        builder = builder.source(parse_asn_list(list)?);
    }
    if let Some(list) = &args.dst_asn {
        builder = builder.destination(parse_asn_list(list)?);
    }
    Ok(builder.build()?)
}

/// Registry reading from `--db-dir` with the `--max-table-bytes` limit
fn registry(args: &Args) -> Registry {
    let config = RegistryConfig {
        max_table_bytes: args.max_table_bytes.unwrap_or(DEFAULT_MAX_TABLE_BYTES),
    };
    Registry::with_config(Arc::new(DirectoryProvider::new(&args.db_dir)), config)
}

/// Pick the rule's family and check every address belongs to it
fn resolve_family(requested: Option<FamilyArg>, addresses: &[IpAddr]) -> Result<AddressFamily> {
    let family = match (requested, addresses.first()) {
        (Some(FamilyArg::Ipv4), _) => AddressFamily::Ipv4,
        (Some(FamilyArg::Ipv6), _) => AddressFamily::Ipv6,
        (None, Some(addr)) => AddressFamily::of(addr),
        (None, None) => AddressFamily::Ipv4,
    };

    if let Some(addr) = addresses.iter().find(|a| AddressFamily::of(a) != family) {
        bail!("address {} is not an {} address", addr, family);
    }
    Ok(family)
}

/// Build a `(source, destination)` pair with `addr` in the inspected slot
fn packet_for(direction: Direction, addr: IpAddr) -> (IpAddr, IpAddr) {
    let other = unspecified_like(&addr);
    match direction {
        Direction::Source => (addr, other),
        Direction::Destination => (other, addr),
    }
}
