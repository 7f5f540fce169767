//! Benchmarks for format result aggregation and VMD listing parsing.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use storctl_bdev::format_resp_from_results;
use storctl_bdev::vmd::parse_vmd_listing;
use storctl_binding::FormatResult;

fn fleet_results(devices: u32, namespaces: u32) -> Vec<FormatResult> {
    (0..devices)
        .flat_map(|dev| {
            (1..=namespaces).map(move |ns| {
                let addr = format!("0000:{dev:02x}:00.0");
                if ns % 7 == 0 {
                    FormatResult::failed(addr, ns, "media error")
                } else {
                    FormatResult::ok(addr, ns)
                }
            })
        })
        .collect()
}

fn bench_aggregate_small(c: &mut Criterion) {
    let results = fleet_results(4, 4);

    c.bench_function("aggregate_4x4", |b| {
        b.iter(|| {
            black_box(format_resp_from_results(black_box(&results)).is_ok());
        });
    });
}

fn bench_aggregate_fleet(c: &mut Criterion) {
    let results = fleet_results(64, 32);

    c.bench_function("aggregate_64x32", |b| {
        b.iter(|| {
            black_box(format_resp_from_results(black_box(&results)).is_ok());
        });
    });
}

fn bench_parse_vmd_listing(c: &mut Criterion) {
    let listing: String = (0..8)
        .map(|i| {
            format!("{i:02x}:05.5 RAID bus controller: Intel Corporation Volume Management Device NVMe RAID Controller (rev 04)\n")
        })
        .collect();

    c.bench_function("parse_vmd_listing_8", |b| {
        b.iter(|| {
            black_box(parse_vmd_listing(black_box(&listing)).is_ok());
        });
    });
}

criterion_group!(
    benches,
    bench_aggregate_small,
    bench_aggregate_fleet,
    bench_parse_vmd_listing
);
criterion_main!(benches);
