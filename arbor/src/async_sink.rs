//! A bounded-queue, background-thread sink wrapper.
//!
//! Grounded on the teacher's `Trace::init`/`writer_loop` pair
//! (`ttlog/src/trace/mod.rs`): a `crossbeam_channel` feeding a single
//! dedicated consumer thread, with a `FlushAndExit`-style message draining the
//! queue before the thread exits. Here the consumer is a user-supplied
//! processor closure rather than a fixed ring buffer, since `SPEC_FULL.md`
//! §4.3 allows wrapping an arbitrary processing function (e.g. "write to a
//! remote collector") behind the same bounded-queue-plus-worker-thread shape.
//!
//! Overflow policy is drop-newest: `try_send` never blocks the caller, and a
//! full queue simply increments a counter and rate-limits an internal
//! diagnostic instead of blocking or growing unbounded (`SPEC_FULL.md` §4.3
//! "Overflow semantics").
//!
//! Lifecycle is the explicit `Created -> Running -> Stopped` state machine of
//! `SPEC_FULL.md` §4.3: [`AsyncSink::new`] only validates and allocates the
//! queue, [`AsyncSink::start`] launches the worker exactly once, and a second
//! `start()` call (from either `Running` or `Stopped`) is a lifecycle error
//! rather than a silent no-op. [`AsyncSink::spawn`] is the common-case
//! convenience that does both in one call, matching the single-call
//! `new_async_sink` constructor in the crate's external interface.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{AsyncRuntimeError, ProcessorError};
use crate::event::Event;
use crate::internal_log::{self, RateLimited};
use crate::level::Level;
use crate::sink::{LevelCell, Sink};

enum Message {
  Event(Event),
  Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
  Created,
  Running,
  Stopped,
}

/// Wraps a processor function with a bounded queue and a background worker
/// thread, turning any `Fn(&Event) -> Result<(), ProcessorError>` into a
/// nonblocking [`Sink`].
pub struct AsyncSink<F> {
  name: String,
  level: LevelCell,
  sender: Sender<Message>,
  state: Mutex<RunState>,
  dropped: AtomicU64,
  overflow_gate: RateLimited,
  worker: Mutex<Option<JoinHandle<()>>>,
  /// Taken by `start()`; `None` after the worker has been launched.
  start_parts: Mutex<Option<(Receiver<Message>, F)>>,
}

impl<F> AsyncSink<F>
where
  F: Fn(&Event) -> Result<(), ProcessorError> + Send + 'static,
{
  /// Validate `capacity` and allocate the queue, without launching a worker.
  /// The returned sink is in the `Created` state; call [`Self::start`]
  /// before registering it, or use [`Self::spawn`] to do both at once.
  pub fn new(name: impl Into<String>, capacity: usize, min_level: Level, process: F) -> Result<Arc<Self>, AsyncRuntimeError> {
    if capacity == 0 {
      return Err(AsyncRuntimeError::InvalidCapacity);
    }

    let (sender, receiver): (Sender<Message>, Receiver<Message>) = bounded(capacity);

    Ok(Arc::new(Self {
      name: name.into(),
      level: LevelCell::new(min_level),
      sender,
      state: Mutex::new(RunState::Created),
      dropped: AtomicU64::new(0),
      overflow_gate: RateLimited::new(100),
      worker: Mutex::new(None),
      start_parts: Mutex::new(Some((receiver, process))),
    }))
  }

  /// Construct and immediately start the worker thread. Equivalent to
  /// `Self::new(..)?.start()` folded into one call for the common case where
  /// a caller has no use for the `Created` state.
  pub fn spawn(name: impl Into<String>, capacity: usize, min_level: Level, process: F) -> Result<Arc<Self>, AsyncRuntimeError> {
    let sink = Self::new(name, capacity, min_level, process)?;
    sink.start().expect("a freshly constructed AsyncSink starts exactly once");
    Ok(sink)
  }

  /// Launch the worker thread, transitioning `Created -> Running`.
  ///
  /// Returns [`AsyncRuntimeError::AlreadyRunning`] if the sink is already
  /// running, or [`AsyncRuntimeError::AlreadyStopped`] if it has already been
  /// closed — per `SPEC_FULL.md` §4.3, this is a one-way state machine.
  pub fn start(&self) -> Result<(), AsyncRuntimeError> {
    let mut state = self.state.lock().expect("async sink state mutex poisoned");
    match *state {
      RunState::Running => return Err(AsyncRuntimeError::AlreadyRunning),
      RunState::Stopped => return Err(AsyncRuntimeError::AlreadyStopped),
      RunState::Created => {},
    }

    let (receiver, process) = self
      .start_parts
      .lock()
      .expect("async sink start_parts mutex poisoned")
      .take()
      .expect("start_parts is Some while state is Created");

    let worker_name = self.name.clone();
    let handle = std::thread::spawn(move || {
      let run = |event: &Event| {
        if let Err(err) = process(event) {
          internal_log::processor_error(&worker_name, &err);
        }
      };

      while let Ok(msg) = receiver.recv() {
        match msg {
          Message::Event(event) => run(&event),
          Message::Close => {
            // Drain whatever is already queued before exiting.
            while let Ok(Message::Event(event)) = receiver.try_recv() {
              run(&event);
            }
            break;
          },
        }
      }
    });

    *self.worker.lock().expect("async sink worker mutex poisoned") = Some(handle);
    *state = RunState::Running;
    Ok(())
  }

  /// Total events dropped due to a full queue since this sink started.
  pub fn dropped_count(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }

  fn enqueue(&self, event: Event) {
    if event.level < self.level.get() {
      return;
    }
    let running = matches!(*self.state.lock().expect("async sink state mutex poisoned"), RunState::Running);
    if !running {
      return;
    }
    if self.sender.try_send(Message::Event(event)).is_err() {
      let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
      internal_log::overflow(&self.overflow_gate, &self.name, total);
    }
  }
}

impl<F> Sink for AsyncSink<F>
where
  F: Fn(&Event) -> Result<(), ProcessorError> + Send + Sync + 'static,
{
  fn accept(&self, event: Event) {
    self.enqueue(event);
  }

  fn min_level(&self) -> Level {
    self.level.get()
  }

  fn set_min_level(&self, level: Level) {
    self.level.set(level);
  }

  fn close(&self) {
    let was_running = {
      let mut state = self.state.lock().expect("async sink state mutex poisoned");
      let was_running = *state == RunState::Running;
      *state = RunState::Stopped;
      was_running
    };
    if was_running {
      let _ = self.sender.send(Message::Close);
    }
    if let Some(handle) = self.worker.lock().expect("async sink worker mutex poisoned").take() {
      let _ = handle.join();
    }
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

impl<F> Drop for AsyncSink<F> {
  fn drop(&mut self) {
    // Best-effort: signal the worker to stop, but don't block a drop on
    // `join` the way `close()` does — an embedder that wants the drain
    // guarantee must call `close()` (or `Logger::shutdown_all`) explicitly.
    let mut state = self.state.lock().expect("async sink state mutex poisoned");
    if *state == RunState::Running {
      let _ = self.sender.send(Message::Close);
    }
    *state = RunState::Stopped;
  }
}

/// Build and start an [`AsyncSink`] in one call — the crate's external
/// constructor for turning a processor function into a registrable [`Sink`]
/// (`SPEC_FULL.md` §6: `new_async_sink(config, queue_capacity, processor)`).
pub fn new_async_sink<F>(
  name: impl Into<String>,
  capacity: usize,
  min_level: Level,
  processor: F,
) -> Result<Arc<AsyncSink<F>>, AsyncRuntimeError>
where
  F: Fn(&Event) -> Result<(), ProcessorError> + Send + Sync + 'static,
{
  AsyncSink::spawn(name, capacity, min_level, processor)
}
