//! Named-channel batching sink.
//!
//! Grounded on the same producer/consumer shape as [`crate::async_sink::AsyncSink`]
//! (itself grounded on the teacher's `Trace`/`writer_loop` pair), but the
//! "processor" here is a fixed action — hand a batch to a caller-owned
//! `crossbeam_channel::Sender<Vec<Event>>` — rather than an arbitrary closure,
//! and dispatch is triggered by either a size threshold or a timer, not by
//! draining one event at a time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::internal_log::{self, RateLimited};
use crate::level::Level;
use crate::sink::{LevelCell, Sink};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBatcherConfig {
  pub batch_size: usize,
  pub flush_interval: Duration,
  pub dispatch_timeout: Duration,
}

impl Default for ChannelBatcherConfig {
  fn default() -> Self {
    Self {
      batch_size: 5,
      flush_interval: Duration::from_secs(1),
      dispatch_timeout: Duration::from_secs(1),
    }
  }
}

/// Accumulates events for a named downstream channel and dispatches them in
/// batches, either once `batch_size` is reached or every `flush_interval`,
/// whichever comes first.
pub struct ChannelBatcher {
  level: LevelCell,
  pending: Mutex<Vec<Event>>,
  downstream: Sender<Vec<Event>>,
  batch_size: usize,
  dispatch_timeout: Duration,
  dropped_batches: AtomicU64,
  drop_gate: RateLimited,
  running: AtomicBool,
  timer: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ChannelBatcher {
  pub fn start(
    name: impl Into<String>,
    downstream: Sender<Vec<Event>>,
    mut config: ChannelBatcherConfig,
    min_level: Level,
  ) -> Arc<Self> {
    if config.batch_size == 0 {
      config.batch_size = ChannelBatcherConfig::default().batch_size;
    }
    if config.flush_interval.is_zero() {
      config.flush_interval = ChannelBatcherConfig::default().flush_interval;
    }

    let batcher = Arc::new(Self {
      level: LevelCell::new(min_level),
      pending: Mutex::new(Vec::new()),
      downstream,
      batch_size: config.batch_size,
      dispatch_timeout: config.dispatch_timeout,
      dropped_batches: AtomicU64::new(0),
      drop_gate: RateLimited::new(20),
      running: AtomicBool::new(true),
      timer: Mutex::new(None),
    });

    let name = name.into();
    let timer_batcher = Arc::clone(&batcher);
    let flush_interval = config.flush_interval;
    let handle = std::thread::spawn(move || {
      while timer_batcher.running.load(Ordering::Acquire) {
        std::thread::sleep(flush_interval);
        if !timer_batcher.running.load(Ordering::Acquire) {
          break;
        }
        timer_batcher.flush(&name);
      }
    });
    *batcher.timer.lock().expect("channel batcher timer mutex poisoned") = Some(handle);

    batcher
  }

  pub fn dropped_batches(&self) -> u64 {
    self.dropped_batches.load(Ordering::Relaxed)
  }

  fn flush(&self, name: &str) {
    let batch = {
      let mut pending = self.pending.lock().expect("channel batcher pending mutex poisoned");
      if pending.is_empty() {
        return;
      }
      std::mem::take(&mut *pending)
    };
    self.dispatch(name, batch);
  }

  fn dispatch(&self, name: &str, batch: Vec<Event>) {
    if self.downstream.send_timeout(batch, self.dispatch_timeout).is_err() {
      let total = self.dropped_batches.fetch_add(1, Ordering::Relaxed) + 1;
      internal_log::overflow(&self.drop_gate, name, total);
    }
  }
}

impl Sink for ChannelBatcher {
  fn accept(&self, event: Event) {
    if event.level < self.level.get() {
      return;
    }
    if !self.running.load(Ordering::Acquire) {
      return;
    }
    let ready = {
      let mut pending = self.pending.lock().expect("channel batcher pending mutex poisoned");
      pending.push(event);
      if pending.len() >= self.batch_size {
        Some(std::mem::take(&mut *pending))
      } else {
        None
      }
    };
    if let Some(batch) = ready {
      self.dispatch("channel", batch);
    }
  }

  fn min_level(&self) -> Level {
    self.level.get()
  }

  fn set_min_level(&self, level: Level) {
    self.level.set(level);
  }

  fn close(&self) {
    if self.running.swap(false, Ordering::AcqRel) {
      self.flush("channel");
      if let Some(handle) = self.timer.lock().expect("channel batcher timer mutex poisoned").take() {
        let _ = handle.join();
      }
    }
  }

  fn as_any(&self) -> &dyn std::any::Any {
    self
  }
}

impl Drop for ChannelBatcher {
  fn drop(&mut self) {
    self.close();
  }
}
