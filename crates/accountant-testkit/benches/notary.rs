//! Signing benchmarks.
//!
//! Measures canonical encoding and each notary over payloads of growing
//! attribute counts.

use accountant_core::{
    canonical_bytes, Blake3Notary, CipherRegistry, Ed25519Notary, EntryPayload, Keypair,
    ModelRef, Notary, Properties, Sha512Notary, Signable,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

fn payload(attributes: usize) -> Value {
    let properties: Properties = (0..attributes)
        .map(|i| (format!("attribute_{i}"), json!(format!("value number {i}"))))
        .collect();

    EntryPayload::builder("updated", ModelRef::new("article", 1))
        .properties(properties)
        .build(&CipherRegistry::new())
        .map(|payload| payload.signable())
        .unwrap_or(Value::Null)
}

fn bench_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_bytes");
    for size in [4, 32, 256] {
        let value = payload(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| canonical_bytes(black_box(value)))
        });
    }
    group.finish();
}

fn bench_notaries(c: &mut Criterion) {
    let notaries: Vec<(&str, Box<dyn Notary>)> = vec![
        ("sha512", Box::new(Sha512Notary)),
        ("blake3", Box::new(Blake3Notary)),
        ("ed25519", Box::new(Ed25519Notary::new(Keypair::from_seed(&[7; 32])))),
    ];

    let mut group = c.benchmark_group("sign");
    let value = payload(32);
    for (name, notary) in &notaries {
        group.bench_with_input(BenchmarkId::from_parameter(name), &value, |b, value| {
            b.iter(|| notary.sign(black_box(value)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_canonical, bench_notaries);
criterion_main!(benches);
