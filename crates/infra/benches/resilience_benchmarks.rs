use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cnjflow_core::{CnjNumber, validate_format};
use cnjflow_infra::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use cnjflow_infra::external::RetryPolicy;

const VALID: &str = "1234567-12.1234.1.12.1234";

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cnj_validation");
    group.throughput(Throughput::Elements(1));

    for input in [VALID, "1234567-12.1234.1.12.12345", "not a cnj", ""] {
        group.bench_with_input(BenchmarkId::new("validate_format", input.len()), input, |b, input| {
            b.iter(|| validate_format(black_box(input)))
        });
    }

    group.bench_function("parse_valid", |b| {
        b.iter(|| CnjNumber::parse(black_box(VALID)).unwrap())
    });

    group.finish();
}

fn bench_breaker_overhead(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("circuit_breaker");
    group.sample_size(1000);

    group.bench_function("direct_call", |b| {
        b.iter(|| rt.block_on(async { Ok::<_, ()>(black_box(1u32)) }))
    });

    let closed = CircuitBreaker::new("bench-closed", CircuitBreakerConfig::default());
    group.bench_function("closed_call", |b| {
        b.iter(|| rt.block_on(closed.call(|| async { Ok::<_, ()>(black_box(1u32)) })))
    });

    let open = CircuitBreaker::new(
        "bench-open",
        CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: std::time::Duration::from_secs(3600),
        },
    );
    let _ = rt.block_on(open.call(|| async { Err::<u32, ()>(()) }));
    group.bench_function("open_rejection", |b| {
        b.iter(|| rt.block_on(open.call(|| async { Ok::<_, ()>(black_box(1u32)) })))
    });

    group.finish();
}

fn bench_backoff_schedule(c: &mut Criterion) {
    let policy = RetryPolicy::default();
    c.bench_function("retry_delay_for_attempt", |b| {
        b.iter(|| {
            (1..=policy.max_retries)
                .map(|attempt| policy.delay_for_attempt(black_box(attempt)))
                .sum::<std::time::Duration>()
        })
    });
}

criterion_group!(
    benches,
    bench_validation,
    bench_breaker_overhead,
    bench_backoff_schedule
);
criterion_main!(benches);
