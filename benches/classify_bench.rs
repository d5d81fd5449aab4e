use asnmatch::{AddressFamily, Ipv4Range, Ipv6Range, MemoryProvider, Registry, Rule, RuleConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// `n` evenly spaced IPv4 ranges of 256 addresses each
fn v4_ranges(n: u32) -> Vec<Ipv4Range> {
    (0..n)
        .map(|i| {
            let begin = i << 12;
            Ipv4Range {
                begin,
                end: begin + 255,
            }
        })
        .collect()
}

fn v6_ranges(n: u16) -> Vec<Ipv6Range> {
    (0..n)
        .map(|i| {
            Ipv6Range::new(
                Ipv6Addr::new(0x2001, i, 0, 0, 0, 0, 0, 0),
                Ipv6Addr::new(0x2001, i, 0xff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff),
            )
        })
        .collect()
}

fn benchmark_table_contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_contains_v4");
    for n in [16u32, 1024, 65536] {
        let table = asnmatch::RangeTable::from_v4(64496, v4_ranges(n));
        let hit = IpAddr::V4(Ipv4Addr::from(((n / 2) << 12) + 10));
        let miss = IpAddr::V4(Ipv4Addr::from(((n / 2) << 12) + 1000));

        group.bench_with_input(BenchmarkId::new("hit", n), &hit, |b, &addr| {
            b.iter(|| table.contains(black_box(addr)))
        });
        group.bench_with_input(BenchmarkId::new("miss", n), &miss, |b, &addr| {
            b.iter(|| table.contains(black_box(addr)))
        });
    }
    group.finish();

    let table = asnmatch::RangeTable::from_v6(64496, v6_ranges(4096));
    let addr: IpAddr = "2001:800:aa::1".parse().unwrap();
    c.bench_function("table_contains_v6_4096", |b| {
        b.iter(|| table.contains(black_box(addr)))
    });
}

fn benchmark_rule_matches(c: &mut Criterion) {
    let mut provider = MemoryProvider::new();
    for asn in 1..=15u32 {
        let ranges: Vec<Ipv4Range> = v4_ranges(1024)
            .into_iter()
            .map(|r| Ipv4Range {
                begin: r.begin + asn * 512,
                end: r.end + asn * 512,
            })
            .collect();
        provider.insert_v4(asn, &ranges);
    }
    let registry = Registry::new(Arc::new(provider));
    let config = RuleConfig::builder().source(1..=15).build().unwrap();
    let rule = Rule::install(&registry, config, AddressFamily::Ipv4).unwrap();

    let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    let last = IpAddr::V4(Ipv4Addr::from(15 * 512 + 5));
    let none = IpAddr::V4(Ipv4Addr::from(u32::MAX));

    c.bench_function("rule_15_asns_last_matches", |b| {
        b.iter(|| rule.matches(black_box(last), any))
    });
    c.bench_function("rule_15_asns_no_match", |b| {
        b.iter(|| rule.matches(black_box(none), any))
    });

    rule.teardown(&registry);
}

fn benchmark_acquire_release(c: &mut Criterion) {
    let mut provider = MemoryProvider::new();
    provider.insert_v4(64496, &v4_ranges(4096));
    let registry = Registry::new(Arc::new(provider));

    c.bench_function("acquire_release_cold", |b| {
        b.iter(|| {
            let table = registry.acquire(black_box(64496), AddressFamily::Ipv4).unwrap();
            registry.release(table);
        })
    });

    let held = registry.acquire(64496, AddressFamily::Ipv4).unwrap();
    c.bench_function("acquire_release_shared", |b| {
        b.iter(|| {
            let table = registry.acquire(black_box(64496), AddressFamily::Ipv4).unwrap();
            registry.release(table);
        })
    });
    registry.release(held);
}

criterion_group!(
    benches,
    benchmark_table_contains,
    benchmark_rule_matches,
    benchmark_acquire_release
);
criterion_main!(benches);
