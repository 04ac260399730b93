use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kuba_insights::aggregation::BoundedAggregator;
use kuba_insights::sampling::{build_sample_times, Execution, Plan};
use kuba_insights::series::{assemble, SeriesPivot};
use kuba_insights::types::{GroupedResult, Interval, IntervalUnit};

fn create_results(labels: usize) -> Vec<GroupedResult> {
    (0..labels)
        .map(|i| GroupedResult::new(format!("label-{}", i), (i % 17) as u64 + 1))
        .collect()
}

fn create_plan(buckets: i64) -> Plan {
    let reference = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    Plan::uncompressed(build_sample_times(
        buckets,
        Interval::new(IntervalUnit::Day, 1),
        reference,
    ))
}

fn bench_pivot_and_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("pivot");

    for labels in [10, 100, 1000].iter() {
        let plan = create_plan(90);
        let results = create_results(*labels);

        group.bench_with_input(BenchmarkId::from_parameter(labels), labels, |b, _| {
            b.iter(|| {
                let mut pivot = SeriesPivot::new();
                for time in &plan.sample_times {
                    // Ten repositories per sample point
                    for _ in 0..10 {
                        pivot.fold(&Execution::new(*time), &results);
                    }
                }
                black_box(assemble(pivot, &plan))
            });
        });
    }

    group.finish();
}

fn bench_bounded_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_aggregation");

    for capacity in [1_000u64, 100_000_000].iter() {
        let labels: Vec<String> = (0..500).map(|i| format!("label-{}", i)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, &cap| {
            b.iter(|| {
                let mut agg = BoundedAggregator::new(cap);
                for round in 0..20u64 {
                    for label in &labels {
                        agg.add(label, round % 3 + 1);
                    }
                }
                black_box(agg.drain())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pivot_and_assemble, bench_bounded_aggregation);
criterion_main!(benches);
