// Rate Counter Benchmarks
//
// Measures the allocation fast path of the fixed-window counter, alone and
// under thread contention.

use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use task_throttler::Rate;

/// Benchmark: uncontended allocation against a wide-open quota
fn bench_allocate_uncontended(c: &mut Criterion) {
    let rate = Rate::new(u32::MAX, Duration::from_secs(1));

    c.bench_function("rate_allocate_uncontended", |b| {
        b.iter(|| black_box(rate.allocate()));
    });
}

/// Benchmark: allocation while other threads hammer the same counter
fn bench_allocate_contended(c: &mut Criterion) {
    let rate = Arc::new(Rate::new(u32::MAX, Duration::from_secs(1)));

    c.bench_function("rate_allocate_contended", |b| {
        b.iter_custom(|iters| {
            let start = std::time::Instant::now();
            thread::scope(|scope| {
                for _ in 0..4 {
                    let rate = Arc::clone(&rate);
                    scope.spawn(move || {
                        for _ in 0..iters {
                            black_box(rate.allocate());
                        }
                    });
                }
            });
            start.elapsed() / 4
        });
    });
}

/// Benchmark: allocation when the quota is already exhausted (rejection path)
fn bench_allocate_exhausted(c: &mut Criterion) {
    let rate = Rate::new(1, Duration::from_secs(3600));
    rate.allocate();

    c.bench_function("rate_allocate_exhausted", |b| {
        b.iter(|| black_box(rate.allocate()));
    });
}

criterion_group!(
    benches,
    bench_allocate_uncontended,
    bench_allocate_contended,
    bench_allocate_exhausted
);
criterion_main!(benches);
