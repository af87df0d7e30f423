//! Severity levels for [`crate::event::Event`]s.
//!
//! A single totally-ordered enum is shared by every component in this crate —
//! the registry, the async runtime, the memory store, and the channel batcher
//! all filter on the same `Level` rather than on subsystem-local aliases.

use std::fmt;

/// Log severity, lowest to highest.
///
/// `TRACE` is the most verbose, `PANIC` the most severe. `Ord`/`PartialOrd`
/// follow declaration order, so `level >= Level::Warn` is a valid filter.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Level {
  Trace = 0,
  Debug = 1,
  Info = 2,
  Warn = 3,
  Error = 4,
  Fatal = 5,
  Panic = 6,
}

impl Level {
  /// Short upper-case tag used by the pipe-delimited rendering (`"WARN"`, `"ERROR"`, ...).
  pub fn as_str(&self) -> &'static str {
    match self {
      Level::Trace => "TRACE",
      Level::Debug => "DEBUG",
      Level::Info => "INFO",
      Level::Warn => "WARN",
      Level::Error => "ERROR",
      Level::Fatal => "FATAL",
      Level::Panic => "PANIC",
    }
  }

  /// Parse a case-insensitive level string.
  ///
  /// Recognises `trace`, `debug`, `info`, `warn`/`warning`, `error`, `fatal`,
  /// `panic`, and `disabled`/`off` (mapped to the highest level so nothing
  /// passes the filter). Anything else falls back to [`Level::Info`] — this
  /// function never fails, matching the "no exception is raised" contract for
  /// `with_level_from_string`. The caller is expected to log a warning for
  /// the fallback case; this function only does the parsing.
  pub fn from_str_lenient(s: &str) -> (Level, bool) {
    match s.to_ascii_lowercase().as_str() {
      "trace" => (Level::Trace, true),
      "debug" => (Level::Debug, true),
      "info" => (Level::Info, true),
      "warn" | "warning" => (Level::Warn, true),
      "error" => (Level::Error, true),
      "fatal" => (Level::Fatal, true),
      "panic" => (Level::Panic, true),
      "disabled" | "off" => (Level::Panic, true),
      _ => (Level::Info, false),
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
