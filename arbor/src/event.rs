//! # Event
//!
//! The immutable record produced by a terminal [`crate::event_builder::EventBuilder`]
//! call and fanned out to every registered sink.
//!
//! Unlike the teacher crate's bit-packed, string-interned `LogEvent` (optimised
//! for a fixed three-field cache-line layout), this crate's `Event` carries an
//! open `fields` map of arbitrary key/value pairs with no cap, which rules out
//! a fixed-size array. The trade is a small heap allocation per event with
//! fields instead of zero-allocation packing; the fanout core is still the
//! single allocation per event (one `HashMap`, one `String` per field value),
//! not per-sink.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::level::Level;

/// A single structured field value.
///
/// Mirrors the teacher's `FieldValue` enum in spirit (a small, Copy-where-possible,
/// serde-tagged union) but adds `Duration` and `List` to match the data model's
/// field-value vocabulary, and stores strings inline rather than as interned ids
/// since this crate does not intern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
  Str(String),
  Int(i64),
  Float(f64),
  Bool(bool),
  Duration(Duration),
  List(Vec<String>),
}

impl FieldValue {
  /// Render the value the way the pipe-delimited store schema expects (`k=v`).
  pub fn render(&self) -> String {
    match self {
      FieldValue::Str(s) => s.clone(),
      FieldValue::Int(i) => i.to_string(),
      FieldValue::Float(f) => f.to_string(),
      FieldValue::Bool(b) => b.to_string(),
      FieldValue::Duration(d) => format!("{:?}", d),
      FieldValue::List(items) => items.join(","),
    }
  }
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self {
    FieldValue::Str(s.to_string())
  }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self {
    FieldValue::Str(s)
  }
}

impl From<i64> for FieldValue {
  fn from(v: i64) -> Self {
    FieldValue::Int(v)
  }
}

impl From<f64> for FieldValue {
  fn from(v: f64) -> Self {
    FieldValue::Float(v)
  }
}

impl From<bool> for FieldValue {
  fn from(v: bool) -> Self {
    FieldValue::Bool(v)
  }
}

impl From<Duration> for FieldValue {
  fn from(v: Duration) -> Self {
    FieldValue::Duration(v)
  }
}

/// A single structured log event, immutable once built.
///
/// # Invariants
///
/// - Constructed exactly once by [`crate::event_builder::EventBuilder`] terminal
///   methods; no sink may mutate a field after construction.
/// - `timestamp` is assigned exactly once, at emit time.
/// - `index` starts `None` and is filled in exactly once, by the memory store,
///   at admission — every other sink sees `None` unless the memory store ran
///   first on the same snapshot, which callers must not rely on (fanout order
///   across sinks is unspecified, see `SPEC_FULL.md` §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub level: Level,
  pub timestamp: DateTime<Utc>,
  pub correlation_id: Option<String>,
  pub prefix: Option<String>,
  pub function: Option<String>,
  pub message: String,
  pub error: Option<String>,
  pub fields: HashMap<String, FieldValue>,
  /// Monotonic admission sequence, assigned by the memory store. `None` until
  /// (and unless) the event passes through a registered memory-store sink.
  pub index: Option<u64>,
}

impl Event {
  /// Render using the stable pipe-delimited schema asserted by the memory
  /// store's query contract (`SPEC_FULL.md` §4.5):
  ///
  /// ```text
  /// LEVEL|HH:MM:SS.mmm|PREFIX|FUNCTION|CORR_ID|k=v|k=v|error=…|MESSAGE
  /// ```
  ///
  /// Absent segments collapse to an empty string between the pipes so the
  /// column count stays fixed regardless of which optional attributes are set.
  pub fn render_line(&self) -> String {
    let mut parts = vec![
      self.level.as_str().to_string(),
      self.timestamp.format("%H:%M:%S%.3f").to_string(),
      self.prefix.clone().unwrap_or_default(),
      self.function.clone().unwrap_or_default(),
      self.correlation_id.clone().unwrap_or_default(),
    ];

    let mut field_keys: Vec<&String> = self.fields.keys().collect();
    field_keys.sort();
    for key in field_keys {
      parts.push(format!("{}={}", key, self.fields[key].render()));
    }

    if let Some(err) = &self.error {
      parts.push(format!("error={}", err));
    }

    parts.push(self.message.clone());
    parts.join("|")
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.render_line())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base_event() -> Event {
    Event {
      level: Level::Info,
      timestamp: DateTime::parse_from_rfc3339("2026-01-01T12:00:00.500Z")
        .unwrap()
        .with_timezone(&Utc),
      correlation_id: None,
      prefix: None,
      function: None,
      message: "hello".to_string(),
      error: None,
      fields: HashMap::new(),
      index: None,
    }
  }

  #[test]
  fn render_line_collapses_absent_segments() {
    let event = base_event();
    assert_eq!(event.render_line(), "INFO|12:00:00.500|||||hello");
  }

  #[test]
  fn render_line_includes_sorted_fields_and_error() {
    let mut event = base_event();
    event.correlation_id = Some("job-7".to_string());
    event.prefix = Some("svc".to_string());
    event.function = Some("handle".to_string());
    event.error = Some("boom".to_string());
    event.fields.insert("b".to_string(), FieldValue::Int(2));
    event.fields.insert("a".to_string(), FieldValue::Bool(true));

    let line = event.render_line();
    assert_eq!(
      line,
      "INFO|12:00:00.500|svc|handle|job-7|a=true|b=2|error=boom|hello"
    );
  }
}
