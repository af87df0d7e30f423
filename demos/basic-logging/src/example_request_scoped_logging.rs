//! Example 2: a memory store sink and correlation-id-scoped request logging.
//!
//! Mirrors the shape of a request handler: derive a per-request logger with
//! `with_correlation_id`, emit a few events while handling it, then pull
//! every log for that request back out of the memory store at the end —
//! the pattern `SPEC_FULL.md` §1 calls out as the memory sink's reason to
//! exist ("lets handlers retrieve all prior events for a correlation
//! identifier at the end of a request").

use std::sync::Arc;
use std::time::Duration;

use arbor::{Level, Logger, MemoryStoreConfig, MemoryStoreSink, SinkRegistry};

pub fn example_request_scoped_logging() {
  println!("\n=== Example 2: Request-Scoped Logging ===");

  let registry = Arc::new(SinkRegistry::new());
  registry.register(arbor::logger::DEFAULT_MEMORY_SINK, MemoryStoreSink::new(MemoryStoreConfig::default(), Level::Trace));
  let base_logger = Logger::with_registry(registry);

  handle_request(&base_logger, "order-42");
  handle_request(&base_logger, "order-43");

  for corr_id in ["order-42", "order-43"] {
    let logs = base_logger.get_memory_logs_for_correlation(corr_id);
    println!("-- logs for {corr_id} --");
    for line in logs.values() {
      println!("{line}");
    }
  }
}

fn handle_request(base_logger: &Logger, correlation_id: &str) {
  let logger = base_logger.copy().with_correlation_id(correlation_id);

  logger.info().msg("received request");
  std::thread::sleep(Duration::from_millis(1));
  logger.info().int("items", 3).msg("validated cart");
  logger.info().msg("request handled");
}
