//! A pull-based, buffered, event-driven byte stream, in the vein of
//! Node.js's `Readable`: a producer fills an internal buffer on demand,
//! consumers either pull bytes with `read()` or subscribe and let the
//! stream push chunks to them, and `pipe()` wires a source straight into
//! one or more destinations with backpressure handled automatically.

mod chunk;
mod decoder;
mod error;
mod events;
mod mode;
mod pipe;
mod producer;
mod readable;
mod state;

pub use chunk::Chunk;
pub use decoder::{Decoder, Utf8Decoder};
pub use error::{Error, Result};
pub use events::{Event, EventKind, Handler};
pub use mode::{LegacyEvent, LegacyPushSource, Wrapped};
pub use pipe::{PipeOptions, Sink, SinkHandle};
pub use producer::{MemoryProducer, Producer};
pub use readable::Readable;
pub use state::Config;
