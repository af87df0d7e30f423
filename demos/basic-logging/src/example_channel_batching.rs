//! Example 4: a named channel batcher forwarding batches downstream.
//!
//! Demonstrates `Logger::set_channel_with_buffer` — the batch dispatches
//! either once it reaches `batch_size` or after `flush_interval`, whichever
//! comes first (`SPEC_FULL.md` §4.6).

use std::sync::Arc;
use std::time::Duration;

use arbor::{Logger, SinkRegistry};

pub fn example_channel_batching() {
  println!("\n=== Example 4: Channel Batching ===");

  let registry = Arc::new(SinkRegistry::new());
  let logger = Logger::with_registry(registry);
  let (downstream, batches) = crossbeam_channel::unbounded();

  logger.set_channel_with_buffer("audit", downstream, 3, Duration::from_millis(200));

  for i in 0..7 {
    logger.info().int("event_id", i).msg("audit event");
  }

  // Two full batches of 3 dispatch immediately; the trailing event dispatches
  // once the flush timer fires.
  for _ in 0..3 {
    if let Ok(batch) = batches.recv_timeout(Duration::from_millis(500)) {
      println!("received batch of {} events", batch.len());
    }
  }

  logger.unregister_channel("audit");
}
