//! Benchmarks for the markup pipeline.

#![allow(clippy::format_push_string)] // Benchmark setup code, performance not critical

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use quill_markup::{ContainerScanner, Pipeline, ScanOptions, sub_sup};

/// Generate a post exercising every extension.
fn generate_post(sections: usize) -> String {
    let mut md = String::from("---\ntitle: Bench\n---\n# Bench\n\n");
    for i in 0..sections {
        md.push_str(&format!("## Section {i} {{#s{i} .part}}\n\n"));
        md.push_str("Water is H~2~O and E = mc^2^, with `inline ==code==`.\n\n");
        md.push_str(":::info\nA note with ==marked== text and !!a spoiler!!{.blur}.\n\n");
        md.push_str("+++warning Details\nCollapsed {日本^に ほん} content.\n+++\n:::\n\n");
        md.push_str(";;;lang Rust\n```rust\nfn main() {}\n```\n;;;\n\n;;;lang Go\n```go\nfunc main() {}\n```\n;;;\n\n");
        md.push_str("- item {.done}\n- another\n\n[span]{.hl} and ++inserted++{.wavy}\n\n{.closing}\n\n");
    }
    md
}

fn bench_scanner(c: &mut Criterion) {
    let post = generate_post(20);
    c.bench_function("scan_containers", |b| {
        b.iter(|| ContainerScanner::new(ScanOptions::default()).scan(&post));
    });
}

fn bench_sub_sup(c: &mut Criterion) {
    let post = generate_post(20);
    c.bench_function("sub_sup", |b| b.iter(|| sub_sup(&post)));
}

fn bench_pipeline_sizes(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let mut group = c.benchmark_group("pipeline");
    for sections in [1, 10, 100] {
        let post = generate_post(sections);
        group.throughput(Throughput::Bytes(post.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &post, |b, post| {
            b.iter(|| pipeline.render(post));
        });
    }
    group.finish();
}

fn bench_deep_nesting(c: &mut Criterion) {
    let post = format!("{}body\n{}", ":::info\n".repeat(1000), ":::\n".repeat(1000));
    c.bench_function("scan_1000_nested_openers", |b| {
        b.iter(|| ContainerScanner::new(ScanOptions::default()).scan(&post));
    });
}

criterion_group!(
    benches,
    bench_scanner,
    bench_sub_sup,
    bench_pipeline_sizes,
    bench_deep_nesting,
);

criterion_main!(benches);
