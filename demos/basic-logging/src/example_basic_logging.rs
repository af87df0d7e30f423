//! Example 1: register a terminal sink and emit at each severity.

use std::sync::Arc;

use arbor::{Level, Logger, SinkRegistry, TerminalSink};

pub fn example_basic_logging() {
  println!("\n=== Example 1: Basic Logging ===");

  let registry = Arc::new(SinkRegistry::new());
  registry.register("terminal", Arc::new(TerminalSink::new(Level::Trace)));
  let logger = Logger::with_registry(registry).with_prefix("demo");

  logger.info().msg("application started");
  logger.debug().int("pid", std::process::id() as i64).msg("debug information");
  logger.warn().msg("this is a warning");
  logger.error().str("component", "startup").msg("an error occurred");
}
