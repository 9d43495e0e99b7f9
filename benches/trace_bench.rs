/// Benchmarks for the thunktrace hot paths.
///
/// Run with: `cargo bench`
///
/// Covers the per-event costs that dominate a trace run:
/// - Structural hashing of value shapes
/// - Fingerprint combined-hash computation
/// - Catalogue recording (dedup hit and miss)
/// - Dependency graph argument recording

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use thunktrace::domain::catalogue::FingerprintCatalogue;
use thunktrace::domain::depgraph::{DependencyGraph, DependencyNode};
use thunktrace::domain::fingerprint::{CallFingerprint, Dispatch, FunctionId, RETURN_SLOT};
use thunktrace::domain::shape::ValueShape;

fn wide_shape(attrs: usize) -> ValueShape {
    ValueShape::new(
        "double",
        vec!["shared".to_string()],
        vec!["data.frame".to_string(), "tbl".to_string()],
        (0..attrs).map(|i| format!("attr_{}", i)).collect(),
    )
}

fn fingerprint(name: &str, slots: usize, seq: u64) -> CallFingerprint {
    let mut fp = CallFingerprint::new(
        "base",
        name,
        FunctionId::from_definition("base", name),
        Dispatch::None,
        seq,
    );
    for position in 0..slots as i32 {
        fp.set_slot(position, wide_shape(4));
    }
    fp.set_slot(RETURN_SLOT, ValueShape::of_kind("double"));
    fp
}

fn bench_shape_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape/structural_hash");

    for attrs in [0, 4, 16, 64].iter() {
        let shape = wide_shape(*attrs);
        group.throughput(Throughput::Elements(*attrs as u64 + 3));
        group.bench_with_input(BenchmarkId::new("attrs", attrs), &shape, |b, shape| {
            b.iter(|| black_box(shape).structural_hash())
        });
    }

    group.finish();
}

fn bench_fingerprint_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint/combined_hash");

    for slots in [1, 4, 16, 64].iter() {
        let fp = fingerprint("f", *slots, 0);
        group.throughput(Throughput::Elements(*slots as u64));
        group.bench_with_input(BenchmarkId::new("slots", slots), &fp, |b, fp| {
            b.iter(|| black_box(fp).combined_hash())
        });
    }

    group.finish();
}

fn bench_catalogue_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalogue/record");

    // Every call hits the same entry: the steady-state path of a hot loop.
    group.bench_function("dedup_hit", |b| {
        let mut catalogue = FingerprintCatalogue::new();
        b.iter(|| catalogue.record(black_box(fingerprint("f", 4, 0))))
    });

    // Every call creates a new entry: worst case, unbounded shape diversity.
    group.bench_function("dedup_miss", |b| {
        let mut catalogue = FingerprintCatalogue::new();
        let mut seq = 0u64;
        b.iter(|| {
            seq += 1;
            let mut fp = fingerprint("f", 4, seq);
            fp.set_slot(0, ValueShape::of_kind(&format!("kind_{}", seq)));
            catalogue.record(black_box(fp))
        })
    });

    group.finish();
}

fn bench_depgraph_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("depgraph/record_argument");

    for live_sites in [1, 8, 32].iter() {
        group.bench_with_input(
            BenchmarkId::new("live_sites", live_sites),
            live_sites,
            |b, &live_sites| {
                let mut graph = DependencyGraph::new();
                let f = FunctionId::from_definition("pkg", "f");
                for position in 0..live_sites {
                    graph.record_argument(1, DependencyNode::new(f.clone(), position));
                }
                let g = FunctionId::from_definition("pkg", "g");
                b.iter(|| {
                    graph.record_argument(1, DependencyNode::new(black_box(g.clone()), 0))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_shape_hashing,
    bench_fingerprint_hashing,
    bench_catalogue_record,
    bench_depgraph_record
);
criterion_main!(benches);
