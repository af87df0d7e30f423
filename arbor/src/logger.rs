//! The facade applications hold onto: mutable context plus level-keyed
//! builder constructors.
//!
//! Grounded on the teacher's `Trace` handle (`ttlog/src/trace/mod.rs`) in
//! spirit — one small struct threads carry around that fronts the heavier
//! registry/runtime machinery — but widened with a mutable context map,
//! since this crate's loggers carry correlation ids and arbitrary key/value
//! context across a request's lifetime rather than wrapping one fixed
//! channel sender.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::RngCore;

use crossbeam_channel::Sender;

use crate::channel_batcher::{ChannelBatcher, ChannelBatcherConfig};
use crate::event::Event;
use crate::event_builder::EventBuilder;
use crate::internal_log;
use crate::level::Level;
use crate::registry::{self, SinkRegistry};

/// Conventional registry name the name-free memory-query methods
/// (`get_memory_logs`, etc.) look under (`SPEC_FULL.md` §6).
pub const DEFAULT_MEMORY_SINK: &str = "memory";

enum Registry {
  Global,
  Owned(Arc<SinkRegistry>),
}

impl Registry {
  fn get(&self) -> &SinkRegistry {
    match self {
      Registry::Global => registry::global(),
      Registry::Owned(registry) => registry,
    }
  }
}

/// A handle applications hold onto to emit events and carry request-scoped
/// context (correlation id, prefix, arbitrary key/value pairs).
pub struct Logger {
  registry: Registry,
  context: Arc<Mutex<HashMap<String, String>>>,
}

impl Default for Logger {
  fn default() -> Self {
    Self {
      registry: Registry::Global,
      context: Arc::new(Mutex::new(HashMap::new())),
    }
  }
}

impl Logger {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a logger bound to a private registry instead of the process-wide
  /// one. Intended for tests that must not interfere with each other through
  /// shared global state.
  pub fn with_registry(registry: Arc<SinkRegistry>) -> Self {
    Self {
      registry: Registry::Owned(registry),
      context: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub(crate) fn context_snapshot(&self) -> HashMap<String, String> {
    self.context.lock().expect("logger context mutex poisoned").clone()
  }

  pub(crate) fn effective_min_level(&self) -> Level {
    self
      .registry
      .get()
      .snapshot()
      .into_iter()
      .map(|(_, sink)| sink.min_level())
      .min()
      .unwrap_or(Level::Panic)
  }

  pub(crate) fn dispatch(&self, event: Event) {
    self.registry.get().dispatch(event);
  }

  /// Set (or generate, if `id` is empty) the correlation id carried by this
  /// logger's context.
  pub fn with_correlation_id(self, id: impl Into<String>) -> Self {
    let id = id.into();
    let id = if id.is_empty() { generate_correlation_id() } else { id };
    self.context.lock().expect("logger context mutex poisoned").insert("correlation_id".to_string(), id);
    self
  }

  pub fn clear_correlation_id(self) -> Self {
    self.context.lock().expect("logger context mutex poisoned").remove("correlation_id");
    self
  }

  pub fn clear_context(self) -> Self {
    self.context.lock().expect("logger context mutex poisoned").clear();
    self
  }

  pub fn with_prefix(self, prefix: impl Into<String>) -> Self {
    self.context.lock().expect("logger context mutex poisoned").insert("prefix".to_string(), prefix.into());
    self
  }

  pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.context.lock().expect("logger context mutex poisoned").insert(key.into(), value.into());
    self
  }

  /// Update the minimum level of every currently-registered sink. The
  /// logger itself carries no level state; this is a write-through to the
  /// registry snapshot at the moment of the call.
  pub fn with_level(self, level: Level) -> Self {
    for (_, sink) in self.registry.get().snapshot() {
      sink.set_min_level(level);
    }
    self
  }

  /// As [`Self::with_level`], but parses a case-insensitive level string.
  /// Unknown strings fall back to `Level::Info` and log an internal
  /// warning; this method never fails.
  pub fn with_level_from_string(self, s: &str) -> Self {
    let (level, recognised) = Level::from_str_lenient(s);
    if !recognised {
      internal_log::unknown_level(s, level.as_str());
    }
    self.with_level(level)
  }

  /// A new `Logger` sharing the same registry but with an empty context —
  /// deliberately strict so correlation state does not leak across logical
  /// scopes by accident.
  pub fn copy(&self) -> Self {
    Self {
      registry: match &self.registry {
        Registry::Global => Registry::Global,
        Registry::Owned(registry) => Registry::Owned(Arc::clone(registry)),
      },
      context: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn trace(&self) -> EventBuilder<'_> {
    EventBuilder::new(self, Level::Trace)
  }
  pub fn debug(&self) -> EventBuilder<'_> {
    EventBuilder::new(self, Level::Debug)
  }
  pub fn info(&self) -> EventBuilder<'_> {
    EventBuilder::new(self, Level::Info)
  }
  pub fn warn(&self) -> EventBuilder<'_> {
    EventBuilder::new(self, Level::Warn)
  }
  pub fn error(&self) -> EventBuilder<'_> {
    EventBuilder::new(self, Level::Error)
  }
  pub fn fatal(&self) -> EventBuilder<'_> {
    EventBuilder::new(self, Level::Fatal)
  }
  pub fn panic(&self) -> EventBuilder<'_> {
    EventBuilder::new(self, Level::Panic)
  }

  /// Query the conventionally-named memory store (see [`DEFAULT_MEMORY_SINK`])
  /// for every surviving log with the given correlation id at or above
  /// `min_level`. Returns an empty map if no sink is registered under that
  /// name, or if it is not a memory store (`SPEC_FULL.md` §6).
  pub fn get_memory_logs(&self, corr_id: &str, min_level: Level) -> indexmap::IndexMap<String, String> {
    self.get_memory_logs_named(DEFAULT_MEMORY_SINK, corr_id, min_level)
  }

  pub fn get_memory_logs_for_correlation(&self, corr_id: &str) -> indexmap::IndexMap<String, String> {
    self.get_memory_logs_for_correlation_named(DEFAULT_MEMORY_SINK, corr_id)
  }

  pub fn get_memory_logs_with_limit(&self, limit: usize) -> indexmap::IndexMap<String, String> {
    self.get_memory_logs_with_limit_named(DEFAULT_MEMORY_SINK, limit)
  }

  /// As [`Self::get_memory_logs`], but against an explicitly named memory
  /// store — for embedders running more than one (`get_memory_sink(name)` in
  /// the registry already takes a name; this mirrors that at the facade
  /// level for callers who keep several correlation-scoped stores).
  pub fn get_memory_logs_named(&self, name: &str, corr_id: &str, min_level: Level) -> indexmap::IndexMap<String, String> {
    self.query_memory(name, |store| store.logs_for_correlation_min_level(corr_id, min_level))
  }

  pub fn get_memory_logs_for_correlation_named(&self, name: &str, corr_id: &str) -> indexmap::IndexMap<String, String> {
    self.query_memory(name, |store| store.logs_for_correlation(corr_id))
  }

  pub fn get_memory_logs_with_limit_named(&self, name: &str, limit: usize) -> indexmap::IndexMap<String, String> {
    self.query_memory(name, |store| store.recent_logs(limit))
  }

  fn query_memory(
    &self,
    name: &str,
    query: impl FnOnce(&dyn crate::sink::MemoryQuery) -> indexmap::IndexMap<String, String>,
  ) -> indexmap::IndexMap<String, String> {
    let Some(sink) = self.registry.get().get_memory_store(name) else {
      return indexmap::IndexMap::new();
    };
    match sink.as_any().downcast_ref::<crate::memory_store::MemoryStoreSink>() {
      Some(store) => query(store),
      None => indexmap::IndexMap::new(),
    }
  }

  /// Register a named streaming channel with the default batch size (5) and
  /// flush interval (1s) (`SPEC_FULL.md` §4.6 / §6: `set_channel`).
  pub fn set_channel(&self, name: impl Into<String>, downstream: Sender<Vec<Event>>) {
    self.set_channel_with_buffer(name, downstream, 0, std::time::Duration::ZERO);
  }

  /// Register a named streaming channel with an explicit batch size and
  /// flush interval. `batch_size == 0` or `flush_interval.is_zero()`
  /// substitute the documented defaults (`SPEC_FULL.md` §4.6).
  ///
  /// Registering under a name that already has a channel first stops (and
  /// closes) the previous batcher — [`SinkRegistry::register`] already does
  /// this for every sink kind, including channel batchers.
  pub fn set_channel_with_buffer(
    &self,
    name: impl Into<String>,
    downstream: Sender<Vec<Event>>,
    batch_size: usize,
    flush_interval: std::time::Duration,
  ) {
    let name = name.into();
    let config = ChannelBatcherConfig {
      batch_size,
      flush_interval,
      ..ChannelBatcherConfig::default()
    };
    let batcher = ChannelBatcher::start(name.clone(), downstream, config, Level::Trace);
    self.registry.get().register(name, batcher);
  }

  /// Unregister a named channel, stopping its batcher (flushing any pending
  /// events first) and closing its sink. The caller-supplied downstream
  /// channel is not closed — the caller owns it (`SPEC_FULL.md` §4.6).
  pub fn unregister_channel(&self, name: &str) {
    self.registry.get().unregister(name);
  }

  /// Stop every registered sink in the recommended shutdown order: named
  /// channels first, then other async sinks, then synchronous sinks. Since
  /// sink kind is not distinguished at the registry level, this simply
  /// closes every sink — each `close()` implementation already does the
  /// right thing for its own kind (drain, flush, or no-op).
  pub fn shutdown_all(&self) {
    self.registry.get().close_all();
  }
}

fn generate_correlation_id() -> String {
  let mut bytes = [0u8; 16];
  rand::rng().fill_bytes(&mut bytes);
  bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_correlation_id_generates_a_32_char_hex_id() {
    let logger = Logger::new().with_correlation_id("");
    let id = logger.context_snapshot().get("correlation_id").cloned().unwrap();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn copy_does_not_carry_correlation_id_forward() {
    let logger = Logger::new().with_correlation_id("abc");
    let copied = logger.copy();
    assert!(copied.context_snapshot().get("correlation_id").is_none());
  }

  #[test]
  fn clear_context_empties_every_key() {
    let logger = Logger::new().with_prefix("svc").with_context("k", "v");
    let cleared = logger.clear_context();
    assert!(cleared.context_snapshot().is_empty());
  }
}
