//! Event sources for logsaw
//!
//! Receivers decode events from the outside world and hand them to an
//! [`EventSink`], which owns the path into the event container:
//!
//! - [`SocketReceiver`] accepts TCP connections streaming JSON lines
//! - [`FileLoader`] imports JSON-lines files on a background thread
//! - [`SinkLayer`] captures the host process's own `tracing` events

mod appender;
mod codec;
mod error;
mod file;
mod sink;
mod socket;

pub use appender::SinkLayer;
pub use codec::{JsonLinesCodec, MAX_LINE_LENGTH, decode_line, encode_event};
pub use error::ReceiverError;
pub use file::{
    DEFAULT_BATCH_SIZE, FileLoad, FileLoader, LoadSummary, export_events, export_to_file, load_file,
};
pub use sink::EventSink;
pub use socket::SocketReceiver;
