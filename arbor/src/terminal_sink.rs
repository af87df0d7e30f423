//! Colourised standard-output sink.
//!
//! Grounded on the teacher's `stdout_listener::StdoutListener`: a
//! `Mutex<String>` scratch buffer reused across writes plus a level-keyed
//! ANSI colour table. This crate uses the `colored` crate (already a teacher
//! dependency) instead of hand-rolled escape constants, since the ambient
//! stack favours the ecosystem crate over a bespoke one.

use std::any::Any;
use std::io::{self, Write};
use std::sync::Mutex;

use colored::{Color, Colorize};

use crate::event::Event;
use crate::level::Level;
use crate::line_format::{LineFormat, PipeLineFormat};
use crate::sink::{LevelCell, Sink};

fn level_color(level: Level) -> Color {
  match level {
    Level::Trace => Color::Cyan,
    Level::Debug => Color::Blue,
    Level::Info => Color::Green,
    Level::Warn => Color::Yellow,
    Level::Error => Color::Red,
    Level::Fatal => Color::Magenta,
    Level::Panic => Color::Red,
  }
}

/// Writes one coloured line per event to standard output. A per-sink
/// `Mutex` around the write serialises producers so events emitted in order
/// on one thread are written in that order (`SPEC_FULL.md` §4.4).
pub struct TerminalSink {
  level: LevelCell,
  format: Box<dyn LineFormat>,
  buffer: Mutex<String>,
  colorize: bool,
}

impl TerminalSink {
  pub fn new(min_level: Level) -> Self {
    Self {
      level: LevelCell::new(min_level),
      format: Box::new(PipeLineFormat),
      buffer: Mutex::new(String::with_capacity(256)),
      colorize: true,
    }
  }

  pub fn with_format(min_level: Level, format: Box<dyn LineFormat>) -> Self {
    Self {
      level: LevelCell::new(min_level),
      format,
      buffer: Mutex::new(String::with_capacity(256)),
      colorize: true,
    }
  }

  pub fn without_color(mut self) -> Self {
    self.colorize = false;
    self
  }
}

impl Sink for TerminalSink {
  fn accept(&self, event: Event) {
    if event.level < self.level.get() {
      return;
    }
    let line = self.format.format(&event);
    let mut buf = self.buffer.lock().expect("terminal sink buffer mutex poisoned");
    buf.clear();
    if self.colorize {
      buf.push_str(&line.color(level_color(event.level)).to_string());
    } else {
      buf.push_str(&line);
    }
    buf.push('\n');
    let _ = io::stdout().write_all(buf.as_bytes());
  }

  fn min_level(&self) -> Level {
    self.level.get()
  }

  fn set_min_level(&self, level: Level) {
    self.level.set(level);
  }

  fn close(&self) {
    let _ = io::stdout().flush();
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
