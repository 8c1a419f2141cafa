//! Benchmarks for the query layer
//!
//! Run with: cargo bench

use chronicle_query::filter::parse_filter_expression;
use chronicle_query::query::compile_query;
use chronicle_query::stage::{ExecutionMode, Pipeline, StageChain};
use chronicle_query::storage::DataPoint;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::BTreeMap;

fn create_test_points(count: usize) -> Vec<DataPoint> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                DataPoint::from_long(i as i64 * 1000, i as i64)
            } else {
                DataPoint::from_double(i as i64 * 1000, i as f64 * 0.5)
            }
        })
        .collect()
}

fn chain(query: &str) -> StageChain {
    compile_query(query).unwrap().stages.unwrap()
}

fn bench_pipelines(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let streamable = chain("cpu.usage=>add,5=>mult,2.5=>rate");

    for size in [1_000, 100_000] {
        let points = create_test_points(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("streaming_{}", size), |b| {
            b.iter(|| {
                Pipeline::build(&streamable, ExecutionMode::Streaming)
                    .unwrap()
                    .run(black_box(points.clone()))
            })
        });

        group.bench_function(format!("materialized_{}", size), |b| {
            b.iter(|| {
                Pipeline::build(&streamable, ExecutionMode::Materialized)
                    .unwrap()
                    .run(black_box(points.clone()))
            })
        });
    }

    let windowed = chain("cpu.usage=>add,1=>mean,60");
    let points = create_test_points(100_000);
    group.bench_function("window_mean_100000", |b| {
        b.iter(|| {
            Pipeline::build(&windowed, ExecutionMode::Materialized)
                .unwrap()
                .run(black_box(points.clone()))
        })
    });

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    group.bench_function("filter_expression", |b| {
        b.iter(|| {
            parse_filter_expression(black_box("host=web1|host=web2&region~us^*&rack>=r10")).unwrap()
        })
    });

    group.bench_function("query", |b| {
        b.iter(|| compile_query(black_box("cpu.usage.host=web1|host=web2=>add,10=>mean,60")).unwrap())
    });

    let filter = parse_filter_expression("host=web1|host=web2&region~us^*")
        .unwrap()
        .unwrap();
    let tags: BTreeMap<String, String> = [("host", "web2"), ("region", "us-east")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    group.bench_function("evaluate", |b| b.iter(|| filter.evaluate(black_box(&tags))));

    group.finish();
}

criterion_group!(benches, bench_pipelines, bench_compile);
criterion_main!(benches);
