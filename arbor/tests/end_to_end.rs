//! End-to-end scenarios exercising the public surface through real sinks,
//! without touching the process-wide global registry (each test builds its
//! own `Logger::with_registry`, keeping tests independent of each other).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arbor::{
  ChannelBatcherConfig, Level, Logger, MemoryStoreConfig, MemoryStoreSink, ProcessorError, Sink, SinkRegistry,
};

struct CountingSink {
  count: AtomicUsize,
  level: arbor::sink::LevelCell,
}

impl CountingSink {
  fn new(level: Level) -> Self {
    Self { count: AtomicUsize::new(0), level: arbor::sink::LevelCell::new(level) }
  }
}

impl Sink for CountingSink {
  fn accept(&self, _event: arbor::Event) {
    self.count.fetch_add(1, Ordering::SeqCst);
  }
  fn min_level(&self) -> Level {
    self.level.get()
  }
  fn set_min_level(&self, level: Level) {
    self.level.set(level);
  }
  fn close(&self) {}
  fn as_any(&self) -> &dyn std::any::Any {
    self
  }
}

#[test]
fn events_below_a_sinks_threshold_are_filtered() {
  let registry = Arc::new(SinkRegistry::new());
  let sink = Arc::new(CountingSink::new(Level::Warn));
  registry.register("counting", sink.clone());
  let logger = Logger::with_registry(registry);

  logger.info().msg("below threshold, should be dropped");
  assert_eq!(sink.count.load(Ordering::SeqCst), 0);

  logger.error().msg("above threshold, should land");
  assert_eq!(sink.count.load(Ordering::SeqCst), 1);
}

#[test]
fn memory_store_query_preserves_admission_order_per_correlation() {
  let registry = Arc::new(SinkRegistry::new());
  let store = MemoryStoreSink::new(MemoryStoreConfig::default(), Level::Trace);
  registry.register(arbor::logger::DEFAULT_MEMORY_SINK, store);
  let logger = Logger::with_registry(registry).with_correlation_id("job-42");

  logger.info().msg("step one");
  logger.info().msg("step two");
  logger.info().msg("step three");

  let logs = logger.get_memory_logs_for_correlation("job-42");
  let messages: Vec<&str> = logs.values().map(|line| line.rsplit('|').next().unwrap()).collect();
  assert_eq!(messages, vec!["step one", "step two", "step three"]);
}

#[test]
fn memory_store_query_respects_a_minimum_level_filter() {
  let registry = Arc::new(SinkRegistry::new());
  let store = MemoryStoreSink::new(MemoryStoreConfig::default(), Level::Trace);
  registry.register(arbor::logger::DEFAULT_MEMORY_SINK, store);
  let logger = Logger::with_registry(registry).with_correlation_id("job-7");

  logger.debug().msg("ignored at warn threshold");
  logger.warn().msg("kept");
  logger.error().msg("also kept");

  let logs = logger.get_memory_logs("job-7", Level::Warn);
  assert_eq!(logs.len(), 2);
}

#[test]
fn channel_batcher_dispatches_once_the_size_threshold_is_reached() {
  let registry = Arc::new(SinkRegistry::new());
  let (tx, rx) = crossbeam_channel::unbounded();
  let batcher = arbor::ChannelBatcher::start(
    "batch",
    tx,
    ChannelBatcherConfig { batch_size: 3, flush_interval: Duration::from_secs(60), dispatch_timeout: Duration::from_secs(1) },
    Level::Trace,
  );
  registry.register("batch", batcher);
  let logger = Logger::with_registry(registry);

  logger.info().msg("a");
  logger.info().msg("b");
  logger.info().msg("c");

  let batch = rx.recv_timeout(Duration::from_millis(500)).unwrap();
  assert_eq!(batch.len(), 3);
}

#[test]
fn channel_batcher_dispatches_on_its_timer_below_the_size_threshold() {
  let registry = Arc::new(SinkRegistry::new());
  let (tx, rx) = crossbeam_channel::unbounded();
  let batcher = arbor::ChannelBatcher::start(
    "batch",
    tx,
    ChannelBatcherConfig { batch_size: 50, flush_interval: Duration::from_millis(40), dispatch_timeout: Duration::from_secs(1) },
    Level::Trace,
  );
  registry.register("batch", batcher);
  let logger = Logger::with_registry(registry);

  logger.info().msg("solitary event");

  let batch = rx.recv_timeout(Duration::from_millis(500)).unwrap();
  assert_eq!(batch.len(), 1);
}

#[test]
fn shutdown_all_drains_an_async_sink_before_returning() {
  let registry = Arc::new(SinkRegistry::new());
  let (tx, rx) = std::sync::mpsc::channel::<String>();
  let async_sink = arbor::AsyncSink::spawn("collector", 64, Level::Trace, move |event| {
    tx.send(event.message.clone()).map_err(|e| ProcessorError::new(SendFailed(e.to_string())))
  })
  .unwrap();
  registry.register("collector", async_sink);
  let logger = Logger::with_registry(registry);

  for i in 0..10 {
    logger.info().msg(format!("event-{i}"));
  }
  logger.shutdown_all();

  let received: Vec<String> = rx.try_iter().collect();
  assert_eq!(received.len(), 10);
}

#[test]
fn set_channel_with_buffer_registers_a_working_batcher_under_the_given_name() {
  let registry = Arc::new(SinkRegistry::new());
  let logger = Logger::with_registry(registry);
  let (tx, rx) = crossbeam_channel::unbounded();

  logger.set_channel_with_buffer("job-events", tx, 2, Duration::from_secs(60));
  logger.info().msg("a");
  logger.info().msg("b");

  let batch = rx.recv_timeout(Duration::from_millis(500)).unwrap();
  assert_eq!(batch.len(), 2);

  logger.unregister_channel("job-events");
  // Idempotent: a second unregister of an already-absent name is a no-op.
  logger.unregister_channel("job-events");
}

#[derive(Debug)]
struct SendFailed(String);

impl std::fmt::Display for SendFailed {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "send failed: {}", self.0)
  }
}

impl std::error::Error for SendFailed {}
