//! The formatting seam shared by the synchronous sinks.
//!
//! Grounded on the teacher's `stdout_listener`/`file_listener` pair, which
//! each inline their own rendering. Here formatting is pulled out behind a
//! trait so a caller can swap the rendering of [`crate::terminal_sink::TerminalSink`]
//! and [`crate::file_sink::FileSink`] without touching their fanout/locking
//! logic; the default implementation reuses [`crate::event::Event::render_line`]
//! so every sink agrees on the same pipe-delimited schema the memory store
//! uses.

use crate::event::Event;

pub trait LineFormat: Send + Sync {
  fn format(&self, event: &Event) -> String;
}

/// The crate-wide default: the pipe-delimited schema asserted by the memory
/// store's query contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipeLineFormat;

impl LineFormat for PipeLineFormat {
  fn format(&self, event: &Event) -> String {
    event.render_line()
  }
}
