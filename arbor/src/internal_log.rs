//! Diagnostic self-logging for this crate's own plumbing.
//!
//! `SPEC_FULL.md` §9 ("backing-logger pattern") calls for a way for sinks and
//! runtimes to report their own failures (queue overflow, a processor error,
//! a persistence write failure) without looping back through the very
//! [`crate::registry::SinkRegistry`] they are part of — a sink that logged its
//! own overflow through the registry could re-trigger the overflow it is
//! reporting. This module is therefore isolated: it wraps `tracing`'s macros
//! (the same crate the teacher depends on for its `tracing_subscriber` layer
//! integration) and nothing else. An embedder who installs a `tracing_subscriber`
//! subscriber sees these diagnostics; one who doesn't, doesn't — there is no
//! default stderr writer here, because `tracing` itself already does nothing
//! when no subscriber is installed.
//!
//! Overflow warnings are rate-limited per call site via a simple "emit at most
//! once per N occurrences" counter, since a sustained overflow condition would
//! otherwise itself become a logging storm.

use std::sync::atomic::{AtomicU64, Ordering};

/// Rate limiter for a single diagnostic call site.
///
/// Logs on the 1st, and then every `every_nth` occurrence after that, so a
/// long overflow episode still produces periodic evidence without flooding
/// whatever subscriber is installed.
pub struct RateLimited {
  count: AtomicU64,
  every_nth: u64,
}

impl RateLimited {
  pub const fn new(every_nth: u64) -> Self {
    Self {
      count: AtomicU64::new(0),
      every_nth,
    }
  }

  /// Returns `true` if this occurrence should be logged.
  pub fn tick(&self) -> bool {
    let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
    n == 1 || n % self.every_nth.max(1) == 0
  }
}

/// Log a queue/batch overflow, rate-limited by the caller's [`RateLimited`] gate.
pub fn overflow(gate: &RateLimited, sink: &str, dropped_total: u64) {
  if gate.tick() {
    tracing::warn!(sink, dropped_total, "arbor: dropping event(s), sink is overloaded");
  }
}

/// Log a user-supplied processor returning an error.
pub fn processor_error(sink: &str, error: &dyn std::fmt::Display) {
  tracing::warn!(sink, %error, "arbor: sink processor returned an error");
}

/// Log a persistence failure from the memory store's durable mirror.
pub fn persist_error(error: &dyn std::fmt::Display) {
  tracing::warn!(%error, "arbor: memory store durable mirror write failed, continuing in-memory only");
}

/// Log an unrecognised level string falling back to the documented default.
pub fn unknown_level(input: &str, fallback: &str) {
  tracing::warn!(input, fallback, "arbor: unrecognised level string, using fallback");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rate_limiter_fires_on_first_and_then_every_nth() {
    let gate = RateLimited::new(3);
    let fired: Vec<bool> = (0..7).map(|_| gate.tick()).collect();
    assert_eq!(fired, vec![true, false, true, false, false, true, false]);
  }
}
