//! Performance benchmarks for streaming CUR ingestion and aggregation
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cur_assess::aggregate::Aggregator;
use cur_assess::config::ParserSettings;
use cur_assess::parser::StreamingParser;
use cur_assess::sink::MemorySink;
use tokio::runtime::Runtime;

const HEADER: &str = "identity/LineItemId,lineItem/LineItemType,lineItem/UsageStartDate,\
lineItem/ProductCode,lineItem/ResourceId,lineItem/UnblendedCost,product/instanceType,product/region";

const PRODUCTS: [&str; 4] = ["AmazonEC2", "AmazonS3", "AmazonRDS", "AWSLambda"];

/// Generate a CUR export with `num_rows` rows over `distinct` resources
fn generate_export(num_rows: usize, distinct: usize, include_errors: bool) -> String {
    let mut out = String::with_capacity(num_rows * 120);
    out.push_str(HEADER);
    out.push('\n');

    for i in 0..num_rows {
        if include_errors && i % 10 == 5 {
            // Unterminated quote every 10th row
            out.push_str("li-broken,Usage,\"2024-03-01T00:00:00Z,AmazonEC2,i-x,1.0,,us-east-1\n");
            continue;
        }
        let resource = i % distinct;
        out.push_str(&format!(
            "li-{},Usage,2024-03-{:02}T00:00:00Z,{},res-{},{:.4},m5.large,us-east-1\n",
            i,
            i % 28 + 1,
            PRODUCTS[resource % PRODUCTS.len()],
            resource,
            0.01 * (i % 500) as f64
        ));
    }
    out
}

fn benchmark_streaming_parser(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("streaming_parser");

    for size in [1_000, 10_000, 100_000].iter() {
        let export = generate_export(*size, size / 10, false);
        group.throughput(Throughput::Bytes(export.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &export, |b, export| {
            b.iter(|| {
                runtime.block_on(async {
                    StreamingParser::new(ParserSettings::default())
                        .parse_bytes(black_box(export.as_bytes()))
                        .await
                        .unwrap()
                })
            });
        });
    }

    group.finish();
}

fn benchmark_error_handling(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("error_handling");

    // 10% malformed rows
    let export = generate_export(10_000, 1_000, true);

    group.bench_function("malformed_rows", |b| {
        b.iter(|| {
            runtime.block_on(async {
                StreamingParser::new(ParserSettings::default())
                    .parse_bytes(black_box(export.as_bytes()))
                    .await
                    .unwrap()
            })
        });
    });

    group.finish();
}

fn benchmark_overflow(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("overflow");

    let export = generate_export(50_000, 50_000, false);
    let settings = ParserSettings {
        overflow_threshold: 5_000,
        ..ParserSettings::default()
    };

    group.bench_function("memory_sink", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let mut sink = MemorySink::new();
                StreamingParser::new(settings.clone())
                    .with_sink(&mut sink)
                    .parse_bytes(black_box(export.as_bytes()))
                    .await
                    .unwrap()
            })
        });
    });

    group.finish();
}

fn benchmark_aggregation(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("aggregation");

    for size in [10_000, 100_000].iter() {
        let export = generate_export(*size, *size, false);
        let records = runtime
            .block_on(StreamingParser::new(ParserSettings::default()).parse_bytes(export.as_bytes()))
            .unwrap()
            .records;
        let aggregator = Aggregator::default();

        group.bench_with_input(BenchmarkId::new("summarize", size), &records, |b, records| {
            b.iter(|| aggregator.summarize(black_box(records)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_streaming_parser,
    benchmark_error_handling,
    benchmark_overflow,
    benchmark_aggregation
);
criterion_main!(benches);
