//! Performance benchmarks for the dataset pipeline.
//!
//! Run with: cargo bench

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use risewin::align::SeriesAligner;
use risewin::evaluate::AccuracyEvaluator;
use risewin::layout::LabelLayout;
use risewin::normalize::Normalizer;
use risewin::types::RawObservation;
use risewin::window::{WindowBuilder, WindowConfig};

/// Generate long-format rows for `assets` symbols over `days` dates.
fn generate_rows(assets: usize, days: usize) -> Vec<RawObservation> {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let mut rows = Vec::with_capacity(assets * days);
    for a in 0..assets {
        let mut price = 100.0 + a as f64;
        for d in 0..days {
            let noise = ((d as f64 * 0.7 + a as f64).sin() * 2.0 + (d as f64 * 1.3).cos()) * 0.5;
            price = (price + 0.001 * price + noise).max(5.0);
            let date = start + chrono::Duration::days(d as i64);
            rows.push(RawObservation::new(
                format!("S{:02}", a),
                date.format("%Y-%m-%d").to_string(),
                price - 0.5,
                price,
            ));
        }
    }
    rows
}

fn bench_alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("align");
    for days in [250, 1000, 2500] {
        let rows = generate_rows(10, days);
        group.bench_with_input(BenchmarkId::from_parameter(days), &rows, |b, rows| {
            b.iter(|| SeriesAligner::default().align(black_box(rows)).unwrap())
        });
    }
    group.finish();
}

fn bench_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("windows");
    for days in [250, 1000, 2500] {
        let aligned = SeriesAligner::default().align(&generate_rows(10, days)).unwrap();
        let normalizer = Normalizer::fit(&aligned).unwrap();
        let builder = WindowBuilder::new(WindowConfig::new(20, 5));
        group.bench_with_input(BenchmarkId::from_parameter(days), &aligned, |b, aligned| {
            b.iter(|| builder.build(black_box(aligned), &normalizer).unwrap())
        });
    }
    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let layout = LabelLayout::new(10, 5);
    let n = 2000;
    let predictions: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..layout.label_len()).map(|j| ((i * 7 + j * 3) % 10) as f64 / 10.0).collect())
        .collect();
    let truths: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..layout.label_len()).map(|j| ((i + j) % 2) as f64).collect())
        .collect();
    let evaluator = AccuracyEvaluator::new(layout);

    c.bench_function("evaluate_2000x50", |b| {
        b.iter(|| evaluator.evaluate(black_box(&predictions), black_box(&truths)).unwrap())
    });
}

criterion_group!(benches, bench_alignment, bench_windows, bench_evaluation);
criterion_main!(benches);
