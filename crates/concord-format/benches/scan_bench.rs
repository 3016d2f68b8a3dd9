//! Benchmarks for the block scanner
//!
//! Measures performance of:
//! - Top-level Tech block scanning over growing tech trees
//! - Nested Vessel lookup inside a SCANcontroller wrapper
//! - In-place field rewrites

use concord_format::{Block, Blocks, Header};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn tech_tree(count: usize) -> String {
    let mut text = String::new();
    for i in 0..count {
        text.push_str(&format!(
            "Tech\n{{\n\tid = node{}\n\tstate = Available\n\tcost = {}\n\tPart\n\t{{\n\t\tname = part{}\n\t}}\n}}\n",
            i, i * 5, i
        ));
    }
    text
}

fn scan_controller(vessels: usize) -> String {
    let mut text = String::from("SCENARIO\n{\n\tname = SCANcontroller\n\tScanners\n\t{\n");
    for i in 0..vessels {
        text.push_str(&format!(
            "\t\tVessel\n\t\t{{\n\t\t\tguid = {:032x}\n\t\t\tSensor\n\t\t\t{{\n\t\t\t\ttype = 1\n\t\t\t}}\n\t\t}}\n",
            i
        ));
    }
    text.push_str("\t}\n}\n");
    text
}

/// Benchmark top-level scanning of tech trees
fn bench_tech_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("tech_scan");

    for &count in &[10usize, 100, 1_000] {
        let text = tech_tree(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| Blocks::top_level(black_box(text), Header::Prefix("Tech")).count())
        });
    }
    group.finish();
}

/// Benchmark nested vessel scanning
fn bench_nested_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_scan");

    for &count in &[10usize, 100, 1_000] {
        let text = scan_controller(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| Blocks::nested(black_box(text), Header::Exact("Vessel")).count())
        });
    }
    group.finish();
}

/// Benchmark field rewrite
fn bench_with_field(c: &mut Criterion) {
    let block = Block::parse("Science\n{\n\tid = a\n\ttitle = t\n\tsci = 1\n\tcap = 5\n}")
        .expect("benchmark block parses");

    c.bench_function("with_field_rewrite", |b| {
        b.iter(|| black_box(&block).with_field("sci", "2.5"))
    });
    c.bench_function("with_field_insert", |b| {
        b.iter(|| black_box(&block).with_field("dsc", "1"))
    });
}

criterion_group!(benches, bench_tech_scan, bench_nested_scan, bench_with_field);
criterion_main!(benches);
