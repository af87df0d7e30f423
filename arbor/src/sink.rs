//! The uniform contract every fanout target implements.
//!
//! Grounded on the teacher's `listener::LogListener` trait (a minimal,
//! no-async, no-`Result`-on-the-hot-path trait for event consumers) but
//! widened per `SPEC_FULL.md` §4.2/§4.3: a `Sink` here also owns a mutable
//! `min_level` (the teacher's listeners are filtered externally by the
//! subscriber layer, not by the listener itself) and a `close()` lifecycle
//! method, since sinks in this spec are registered/unregistered by name at
//! runtime rather than wired once at startup.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::event::Event;
use crate::level::Level;

/// A named, independently-filtered consumer of [`Event`]s.
///
/// `accept` must be nonblocking for async sinks and "blocking-but-fast" for
/// synchronous ones (`SPEC_FULL.md` §3) — this trait does not distinguish the
/// two at the type level; it is a property of the implementation.
///
/// `close` must be idempotent: a second call is a no-op, never a panic.
pub trait Sink: Send + Sync {
  /// Accept one event already known to have passed the registry-wide
  /// minimum-level gate. Implementations must still apply their own
  /// `min_level()` check (`SPEC_FULL.md` §4.1: "per-sink filtering is
  /// re-applied at sink admission").
  fn accept(&self, event: Event);

  /// The lowest level this sink accepts.
  fn min_level(&self) -> Level;

  /// Update the minimum level. Called by `Logger::with_level` across every
  /// registered sink (`SPEC_FULL.md` §4.7).
  fn set_min_level(&self, level: Level);

  /// Release resources. For async sinks this drains the queue first.
  /// Idempotent.
  fn close(&self);

  /// Support for [`crate::registry::SinkRegistry::get_memory_store`]'s
  /// downcast — sinks that are not the memory store return `self` and let
  /// the caller's `downcast_ref` fail harmlessly.
  fn as_any(&self) -> &dyn Any;
}

/// Query capability implemented only by the memory-store sink.
///
/// Kept as a separate trait (rather than folding the query methods into
/// [`Sink`]) because every other sink has no meaningful implementation of
/// "give me the logs for this correlation id" — per `SPEC_FULL.md` §4.2,
/// `get_memory_store` finds sinks that implement this via `Any` downcast.
pub trait MemoryQuery: Sink {
  fn logs_for_correlation(&self, correlation_id: &str) -> indexmap::IndexMap<String, String>;
  fn logs_for_correlation_min_level(
    &self,
    correlation_id: &str,
    level: Level,
  ) -> indexmap::IndexMap<String, String>;
  fn recent_logs(&self, limit: usize) -> indexmap::IndexMap<String, String>;
}

/// Shared atomic level cell used by every concrete `Sink` implementation so
/// `min_level`/`set_min_level` are lock-free and consistent across threads.
#[derive(Debug)]
pub struct LevelCell(AtomicU8);

impl LevelCell {
  pub fn new(level: Level) -> Self {
    Self(AtomicU8::new(level as u8))
  }

  pub fn get(&self) -> Level {
    // SAFETY: only values produced by `Level as u8` are ever stored.
    unsafe { std::mem::transmute(self.0.load(Ordering::Relaxed)) }
  }

  pub fn set(&self, level: Level) {
    self.0.store(level as u8, Ordering::Relaxed);
  }
}
