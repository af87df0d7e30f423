//! Process-wide registry of named [`Sink`]s.
//!
//! Grounded on the teacher's `Trace` handle (`ttlog/src/trace/mod.rs`): a
//! single shared point of control that every producer thread reaches through,
//! wrapped so all fanout, filtering, and lifecycle decisions live in one
//! place. Where the teacher wires exactly one ring buffer behind a global
//! `tracing` subscriber, this registry holds an arbitrary number of named
//! sinks behind a `RwLock`, since `SPEC_FULL.md` §6 requires runtime
//! register/unregister of multiple fanout targets rather than one fixed
//! pipeline assembled at `init()`.

use std::any::Any;
use std::sync::{Arc, OnceLock, RwLock};

use crate::level::Level;
use crate::sink::{MemoryQuery, Sink};

/// Holds every sink currently registered, keyed by name.
///
/// Registration order is not preserved on purpose — fanout to registered
/// sinks has no specified order (`SPEC_FULL.md` §5) — so a plain `Vec` of
/// `(name, sink)` pairs behind a single `RwLock` is sufficient; there is no
/// need for a concurrent map when writes (register/unregister) are rare
/// relative to reads (fanout on every event).
#[derive(Default)]
pub struct SinkRegistry {
  sinks: RwLock<Vec<(String, Arc<dyn Sink>)>>,
}

impl SinkRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a sink under `name`, replacing any existing sink with the same
  /// name. The replaced sink is closed after the lock is released — the
  /// registry never calls sink methods while holding its lock.
  pub fn register(&self, name: impl Into<String>, sink: Arc<dyn Sink>) {
    let name = name.into();
    let replaced = {
      let mut sinks = self.sinks.write().expect("sink registry poisoned");
      if let Some(existing) = sinks.iter_mut().find(|(n, _)| *n == name) {
        Some(std::mem::replace(&mut existing.1, sink))
      } else {
        sinks.push((name, sink));
        None
      }
    };
    if let Some(old) = replaced {
      old.close();
    }
  }

  /// Remove and close the sink registered under `name`, if any.
  pub fn unregister(&self, name: &str) {
    let removed = {
      let mut sinks = self.sinks.write().expect("sink registry poisoned");
      sinks.iter().position(|(n, _)| n == name).map(|pos| sinks.remove(pos))
    };
    if let Some((_, sink)) = removed {
      sink.close();
    }
  }

  /// Fetch a sink by name.
  pub fn get(&self, name: &str) -> Option<Arc<dyn Sink>> {
    let sinks = self.sinks.read().expect("sink registry poisoned");
    sinks.iter().find(|(n, _)| n == name).map(|(_, s)| Arc::clone(s))
  }

  /// Fetch a sink by name and downcast it to the query capability, for the
  /// memory-store convenience methods on [`crate::logger::Logger`].
  pub fn get_memory_store(&self, name: &str) -> Option<Arc<dyn Sink>> {
    self.get(name).filter(|sink| (sink.as_any() as &dyn Any).is::<crate::memory_store::MemoryStoreSink>())
  }

  /// Names of every currently registered sink, in registration order.
  pub fn names(&self) -> Vec<String> {
    let sinks = self.sinks.read().expect("sink registry poisoned");
    sinks.iter().map(|(n, _)| n.clone()).collect()
  }

  /// A point-in-time snapshot of every registered sink, used by the fanout
  /// path so the lock is held only for the duration of the clone, not for the
  /// duration of dispatch to every sink's `accept`.
  pub fn snapshot(&self) -> Vec<(String, Arc<dyn Sink>)> {
    self.sinks.read().expect("sink registry poisoned").clone()
  }

  /// Dispatch `event` to every registered sink whose `min_level` admits it.
  pub fn dispatch(&self, event: crate::event::Event) {
    for (_, sink) in self.snapshot() {
      if event.level >= sink.min_level() {
        sink.accept(event.clone());
      }
    }
  }

  /// Close every registered sink. Used on process-wide shutdown.
  pub fn close_all(&self) {
    for (_, sink) in self.snapshot() {
      sink.close();
    }
  }
}

/// The process-wide registry instance backing the free functions below and
/// the default [`crate::logger::Logger`].
pub fn global() -> &'static SinkRegistry {
  static REGISTRY: OnceLock<SinkRegistry> = OnceLock::new();
  REGISTRY.get_or_init(SinkRegistry::new)
}

/// Register a sink in the process-wide registry.
pub fn register_sink(name: impl Into<String>, sink: Arc<dyn Sink>) {
  global().register(name, sink);
}

/// Remove a sink from the process-wide registry.
pub fn unregister_sink(name: &str) {
  global().unregister(name);
}

/// Fetch a sink from the process-wide registry.
pub fn get_sink(name: &str) -> Option<Arc<dyn Sink>> {
  global().get(name)
}

/// Fetch a memory-store sink's query capability from the process-wide registry.
pub fn get_memory_sink(name: &str) -> Option<Arc<dyn Sink>> {
  global().get_memory_store(name)
}

/// Names of every sink in the process-wide registry.
pub fn sink_names() -> Vec<String> {
  global().names()
}

/// A point-in-time snapshot of the process-wide registry's sinks.
pub fn snapshot() -> Vec<(String, Arc<dyn Sink>)> {
  global().snapshot()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::Event;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingSink {
    count: AtomicUsize,
    level: crate::sink::LevelCell,
  }

  impl Sink for CountingSink {
    fn accept(&self, _event: Event) {
      self.count.fetch_add(1, Ordering::SeqCst);
    }
    fn min_level(&self) -> Level {
      self.level.get()
    }
    fn set_min_level(&self, level: Level) {
      self.level.set(level);
    }
    fn close(&self) {}
    fn as_any(&self) -> &dyn Any {
      self
    }
  }

  fn sample_event(level: Level) -> Event {
    Event {
      level,
      timestamp: chrono::Utc::now(),
      correlation_id: None,
      prefix: None,
      function: None,
      message: "hi".to_string(),
      error: None,
      fields: Default::default(),
      index: None,
    }
  }

  #[test]
  fn dispatch_skips_sinks_below_their_own_min_level() {
    let registry = SinkRegistry::new();
    let sink = Arc::new(CountingSink {
      count: AtomicUsize::new(0),
      level: crate::sink::LevelCell::new(Level::Warn),
    });
    registry.register("counter", sink.clone());

    registry.dispatch(sample_event(Level::Debug));
    assert_eq!(sink.count.load(Ordering::SeqCst), 0);

    registry.dispatch(sample_event(Level::Error));
    assert_eq!(sink.count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn register_replaces_and_closes_the_previous_sink() {
    let registry = SinkRegistry::new();
    let first = Arc::new(CountingSink {
      count: AtomicUsize::new(0),
      level: crate::sink::LevelCell::new(Level::Trace),
    });
    let second = Arc::new(CountingSink {
      count: AtomicUsize::new(0),
      level: crate::sink::LevelCell::new(Level::Trace),
    });
    registry.register("x", first);
    registry.register("x", second.clone());
    assert_eq!(registry.names(), vec!["x".to_string()]);

    registry.dispatch(sample_event(Level::Info));
    assert_eq!(second.count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn unregister_removes_the_sink() {
    let registry = SinkRegistry::new();
    let sink = Arc::new(CountingSink {
      count: AtomicUsize::new(0),
      level: crate::sink::LevelCell::new(Level::Trace),
    });
    registry.register("x", sink);
    registry.unregister("x");
    assert!(registry.names().is_empty());
  }
}
