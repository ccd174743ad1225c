//! Criterion benchmarks for AdamLab hot paths.
//!
//! Benchmarks:
//! 1. Sanitizer over text rows (the CSV path)
//! 2. Full pipeline at several history lengths

use adamlab_core::{
    run_pipeline, sanitize, BusinessCalendar, MissingClosePolicy, PivotMode, PivotSide,
    ProjectionConfig, RawRecord, WeekdayCalendar,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_rows(n: usize) -> Vec<RawRecord> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let date = WeekdayCalendar.add_business_days(base, i);
            RawRecord::new(date.format("%Y-%m-%d").to_string().as_str(), close.to_string().as_str())
        })
        .collect()
}

fn bench_sanitize(c: &mut Criterion) {
    let rows = make_rows(2_000);
    c.bench_function("sanitize_2000_text_rows", |b| {
        b.iter(|| sanitize(black_box(&rows), MissingClosePolicy::Drop))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let config = ProjectionConfig {
        pivot: PivotMode::Side {
            side: PivotSide::Min,
            lookback: 20,
        },
        horizon: 30,
        ..ProjectionConfig::default()
    };
    for n in [250usize, 1_000, 5_000] {
        let rows = make_rows(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &rows, |b, rows| {
            b.iter(|| run_pipeline(black_box(rows), &config, &WeekdayCalendar))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sanitize, bench_pipeline);
criterion_main!(benches);
