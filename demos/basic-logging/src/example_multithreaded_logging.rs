//! Example 3: many producer threads fanning out through one registry.
//!
//! `SPEC_FULL.md` §5 promises per-thread ordering at each sink but no
//! cross-thread ordering — each worker below gets its own `Logger` bound to
//! the same shared registry and correlation id, so events from different
//! workers interleave at the sink however the scheduler hands them off.

use std::sync::Arc;
use std::thread;

use arbor::{Level, Logger, SinkRegistry, TerminalSink};

pub fn example_multithreaded_logging() {
  println!("\n=== Example 3: Multithreaded Logging ===");

  let registry = Arc::new(SinkRegistry::new());
  registry.register("terminal", Arc::new(TerminalSink::new(Level::Info)));

  let handles: Vec<_> = (0..4)
    .map(|worker_id| {
      let registry = Arc::clone(&registry);
      thread::spawn(move || {
        let logger = Logger::with_registry(registry).with_correlation_id("batch-job").with_prefix(format!("worker-{worker_id}"));
        for i in 0..3 {
          logger.info().int("worker_id", worker_id).int("item", i).msg("processed item");
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().expect("worker thread panicked");
  }
}
