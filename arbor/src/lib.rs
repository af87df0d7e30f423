//! A structured, multi-sink logging library for long-running services.
//!
//! The core pieces, in dependency order: an [`event::Event`] model built by
//! [`event_builder::EventBuilder`]; the [`sink::Sink`] trait every fanout
//! target implements; the [`async_sink::AsyncSink`] bounded-queue runtime and
//! [`registry::SinkRegistry`] process-wide dispatch table built on top of it;
//! and three concrete sinks — [`memory_store::MemoryStoreSink`] (queryable,
//! optionally durable), [`channel_batcher::ChannelBatcher`] (named batched
//! channels), [`terminal_sink::TerminalSink`] and [`file_sink::FileSink`]
//! (synchronous). [`logger::Logger`] is the facade applications hold onto.

pub mod async_sink;
pub mod channel_batcher;
pub mod error;
pub mod event;
pub mod event_builder;
pub mod file_sink;
pub mod internal_log;
pub mod level;
pub mod line_format;
pub mod logger;
pub mod memory_store;
pub mod registry;
pub mod sink;
pub mod terminal_sink;

pub use error::{AsyncRuntimeError, PersistError, ProcessorError};
pub use event::{Event, FieldValue};
pub use event_builder::EventBuilder;
pub use level::Level;
pub use logger::Logger;
pub use sink::{MemoryQuery, Sink};

pub use async_sink::{new_async_sink, AsyncSink};
pub use channel_batcher::{ChannelBatcher, ChannelBatcherConfig};
pub use file_sink::{FileSink, FileSinkConfig};
pub use line_format::{LineFormat, PipeLineFormat};
pub use memory_store::{MemoryStoreConfig, MemoryStoreSink};
pub use terminal_sink::TerminalSink;

pub use registry::{get_memory_sink, get_sink, register_sink, sink_names, snapshot, unregister_sink, SinkRegistry};
