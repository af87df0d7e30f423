//! Benchmarks for the registry dispatch path: how the cost of one `emit`
//! scales with the number of registered sinks and with sink kind.
//!
//! Grounded on `ttlog-benches/distributed_bench.rs`'s Criterion configuration
//! (longer measurement/warm-up windows than the defaults, since this hot
//! path is dominated by thread scheduling noise at microsecond scale) but
//! scaled down to arbor's simpler single-process fanout rather than a
//! simulated multi-node distributed system.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arbor::{Level, Logger, Sink, SinkRegistry};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn configure_criterion() -> Criterion {
  Criterion::default()
    .sample_size(50)
    .measurement_time(Duration::from_secs(5))
    .warm_up_time(Duration::from_secs(2))
}

struct CountingSink(AtomicU64);

impl Sink for CountingSink {
  fn accept(&self, _event: arbor::Event) {
    self.0.fetch_add(1, Ordering::Relaxed);
  }
  fn min_level(&self) -> Level {
    Level::Trace
  }
  fn set_min_level(&self, _level: Level) {}
  fn close(&self) {}
  fn as_any(&self) -> &dyn std::any::Any {
    self
  }
}

fn bench_dispatch_by_sink_count(c: &mut Criterion) {
  let mut group = c.benchmark_group("registry_dispatch");
  for sink_count in [1usize, 4, 16] {
    let registry = Arc::new(SinkRegistry::new());
    for i in 0..sink_count {
      registry.register(format!("sink-{i}"), Arc::new(CountingSink(AtomicU64::new(0))));
    }
    let logger = Logger::with_registry(registry);

    group.bench_with_input(BenchmarkId::from_parameter(sink_count), &sink_count, |b, _| {
      b.iter(|| logger.info().str("k", "v").msg("benchmark event"));
    });
  }
  group.finish();
}

fn bench_builder_field_accumulation(c: &mut Criterion) {
  let registry = Arc::new(SinkRegistry::new());
  registry.register("sink", Arc::new(CountingSink(AtomicU64::new(0))));
  let logger = Logger::with_registry(registry);

  c.bench_function("builder_with_five_fields", |b| {
    b.iter(|| {
      logger
        .info()
        .str("service", "checkout")
        .int("attempt", 3)
        .bool("retry", true)
        .float64("latency_ms", 12.5)
        .dur("elapsed", Duration::from_millis(7))
        .msg("order processed")
    });
  });
}

criterion_group! {
  name = benches;
  config = configure_criterion();
  targets = bench_dispatch_by_sink_count, bench_builder_field_accumulation
}
criterion_main!(benches);
