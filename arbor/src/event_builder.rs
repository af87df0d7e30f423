//! Fluent, single-use construction of one [`Event`].
//!
//! Grounded on the teacher's `event_builder::EventBuilder`, but stripped of
//! its string-interning/object-pooling machinery: that optimises for a fixed
//! three-field event shape under extreme throughput, while this crate's
//! `Event` already carries an open field map (see `event.rs`), so there is
//! nothing left for an interner to deduplicate against a pool. What survives
//! is the shape of the API: a builder bound to one level, chainable field
//! setters, and a terminal `msg`/`msgf` call that materialises the event.

use std::fmt;
use std::time::Duration;

use chrono::Utc;

use crate::event::{Event, FieldValue};
use crate::level::Level;
use crate::logger::Logger;

/// A single-use, single-threaded event under construction.
///
/// Deliberately does not implement `Send`: per `SPEC_FULL.md` §4.1 a builder
/// "shall not escape to another thread." The `Logger` reference enforces
/// this naturally since it is not `Send` either in the way it is borrowed
/// here, but the marker below makes the contract explicit and future-proof
/// against a change to `Logger`'s `Send`-ness.
pub struct EventBuilder<'a> {
  logger: &'a Logger,
  level: Level,
  correlation_id: Option<String>,
  prefix: Option<String>,
  function: Option<String>,
  error: Option<String>,
  fields: std::collections::HashMap<String, FieldValue>,
  _not_send: std::marker::PhantomData<*const ()>,
}

impl<'a> EventBuilder<'a> {
  pub(crate) fn new(logger: &'a Logger, level: Level) -> Self {
    let context = logger.context_snapshot();
    Self {
      logger,
      level,
      correlation_id: context.get("correlation_id").cloned(),
      prefix: context.get("prefix").cloned(),
      function: None,
      error: None,
      fields: std::collections::HashMap::new(),
      _not_send: std::marker::PhantomData,
    }
  }

  pub fn str(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.fields.insert(key.into(), FieldValue::Str(value.into()));
    self
  }

  pub fn strs(mut self, key: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
    let list = values.into_iter().map(Into::into).collect();
    self.fields.insert(key.into(), FieldValue::List(list));
    self
  }

  pub fn int(mut self, key: impl Into<String>, value: i64) -> Self {
    self.fields.insert(key.into(), FieldValue::Int(value));
    self
  }

  pub fn int32(self, key: impl Into<String>, value: i32) -> Self {
    self.int(key, value as i64)
  }

  pub fn int64(self, key: impl Into<String>, value: i64) -> Self {
    self.int(key, value)
  }

  pub fn float32(self, key: impl Into<String>, value: f32) -> Self {
    self.float64(key, value as f64)
  }

  pub fn float64(mut self, key: impl Into<String>, value: f64) -> Self {
    self.fields.insert(key.into(), FieldValue::Float(value));
    self
  }

  pub fn bool(mut self, key: impl Into<String>, value: bool) -> Self {
    self.fields.insert(key.into(), FieldValue::Bool(value));
    self
  }

  pub fn dur(mut self, key: impl Into<String>, value: Duration) -> Self {
    self.fields.insert(key.into(), FieldValue::Duration(value));
    self
  }

  /// Store the error's rendering on the event's `error` attribute. Does not
  /// touch `fields`.
  pub fn err(mut self, error: &dyn std::error::Error) -> Self {
    self.error = Some(error.to_string());
    self
  }

  /// Override the function name attached to the event (defaults to none).
  pub fn function(mut self, name: impl Into<String>) -> Self {
    self.function = Some(name.into());
    self
  }

  /// Materialise and emit the event with a plain message.
  ///
  /// `#[track_caller]` gives `function` a best-effort value (`file:line`)
  /// when the caller never called [`Self::function`] explicitly, per
  /// `SPEC_FULL.md` §3 ("function: optional short string, caller
  /// identification, best-effort").
  #[track_caller]
  pub fn msg(self, message: impl Into<String>) {
    let caller = std::panic::Location::caller();
    self.emit(message.into(), caller);
  }

  /// Materialise and emit the event using `format_args!`-style formatting.
  #[track_caller]
  pub fn msgf(self, args: fmt::Arguments<'_>) {
    let caller = std::panic::Location::caller();
    self.emit(fmt::format(args), caller);
  }

  fn emit(self, message: String, caller: &std::panic::Location<'_>) {
    if self.level < self.logger.effective_min_level() {
      return;
    }
    let function = self.function.or_else(|| Some(format!("{}:{}", caller.file(), caller.line())));
    let event = Event {
      level: self.level,
      timestamp: Utc::now(),
      correlation_id: self.correlation_id,
      prefix: self.prefix,
      function,
      message,
      error: self.error,
      fields: self.fields,
      index: None,
    };
    self.logger.dispatch(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::SinkRegistry;
  use crate::sink::{LevelCell, Sink};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  struct CaptureSink {
    count: AtomicUsize,
    level: LevelCell,
    events: Mutex<Vec<Event>>,
  }

  impl CaptureSink {
    fn new(level: Level) -> Self {
      Self {
        count: AtomicUsize::new(0),
        level: LevelCell::new(level),
        events: Mutex::new(Vec::new()),
      }
    }
  }

  impl Sink for CaptureSink {
    fn accept(&self, event: Event) {
      self.count.fetch_add(1, Ordering::SeqCst);
      self.events.lock().unwrap().push(event);
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
  fn below_threshold_builder_is_a_no_op() {
    let registry = Arc::new(SinkRegistry::new());
    let sink = Arc::new(CaptureSink::new(Level::Error));
    registry.register("cap", sink.clone());
    let logger = Logger::with_registry(registry);

    logger.debug().msg("below threshold");
    assert_eq!(sink.count.load(Ordering::SeqCst), 0);

    logger.error().msg("at threshold");
    assert_eq!(sink.count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn duplicate_field_keys_overwrite_the_prior_value() {
    let registry = Arc::new(SinkRegistry::new());
    let sink = Arc::new(CaptureSink::new(Level::Trace));
    registry.register("cap", sink.clone());
    let logger = Logger::with_registry(registry);

    logger.info().int("attempt", 1).int("attempt", 2).msg("retry");
    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fields.get("attempt"), Some(&FieldValue::Int(2)));
  }
}
