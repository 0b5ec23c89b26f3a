//! Latency benchmarks for the projection hot path
//!
//! Per-log work ahead of the store (lookup + decode + formatting) should stay
//! comfortably under a millisecond; the store round-trips dominate everything
//! else.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use alloy::primitives::{Address, B256, U256};
use launchpad_projector::decoder::decode_event;
use launchpad_projector::registry::{lookup_event, EventKind};
use launchpad_projector::units::format_units;

fn contribution_topics() -> Vec<B256> {
    let mut contributor = [0u8; 32];
    contributor[12..].copy_from_slice(Address::repeat_byte(0x11).as_slice());
    let mut token = [0u8; 32];
    token[12..].copy_from_slice(Address::repeat_byte(0x22).as_slice());
    vec![
        EventKind::ContributionReceived.signature_hash(),
        B256::repeat_byte(0xaa),
        B256::from(contributor),
        B256::from(token),
    ]
}

fn contribution_data() -> Vec<u8> {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&U256::from(1_000_000_000_000_000_000u64).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(1_700_000_000u64).to_be_bytes::<32>());
    data
}

/// Benchmark signature-hash registry lookup
fn bench_registry_lookup(c: &mut Criterion) {
    let topic0 = EventKind::ContributionReceived.signature_hash();

    c.bench_function("registry_lookup", |b| {
        b.iter(|| black_box(lookup_event(black_box(&topic0))))
    });
}

/// Benchmark positional decoding of one contribution log
fn bench_decode_contribution(c: &mut Criterion) {
    let topics = contribution_topics();
    let data = contribution_data();

    c.bench_function("decode_contribution_log", |b| {
        b.iter(|| {
            black_box(
                decode_event(
                    EventKind::ContributionReceived,
                    black_box(&topics),
                    black_box(&data),
                )
                .unwrap(),
            )
        })
    });
}

/// Benchmark decimal-scaled amount formatting
fn bench_format_units(c: &mut Criterion) {
    let amount = U256::from(1_234_567_890_123_456_789u64);

    c.bench_function("format_units_18", |b| {
        b.iter(|| black_box(format_units(black_box(amount), black_box(18))))
    });
}

criterion_group!(
    benches,
    bench_registry_lookup,
    bench_decode_contribution,
    bench_format_units
);

criterion_main!(benches);
