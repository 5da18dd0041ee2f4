//! Destination contract and pipe bookkeeping.

use async_trait::async_trait;

use crate::chunk::Chunk;
use crate::error::Result;

/// The observable contract a pipe destination exposes: `write` reports
/// backpressure via `Ok(false)`, at which point the engine awaits `drain`
/// before sending more. Modeled on `Association::write_loop`'s
/// per-destination `net_conn.send`, generalized from "one transport" to "N
/// independent sinks" and made explicit about backpressure instead of
/// relying on an OS socket buffer.
#[async_trait]
pub trait Sink: Send {
    /// Accepts a chunk. `Ok(false)` means "buffered; don't send more until
    /// `drain()` resolves".
    async fn write(&mut self, chunk: Chunk) -> Result<bool>;

    /// Resolves once the sink is ready for more data after a `false` return
    /// from `write`. Sinks that never apply backpressure can keep the
    /// default, which resolves immediately.
    async fn drain(&mut self) {}

    /// Called when the source ends and this pipe was registered with
    /// `PipeOptions::end` (the default).
    async fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Identifies one active `pipe()` registration, returned by `pipe()` and
/// accepted by `unpipe()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkHandle(pub(crate) u64);

#[derive(Clone, Copy, Debug)]
pub struct PipeOptions {
    /// Call `Sink::end()` when the source ends. Default `true`.
    pub end: bool,
    /// Per-pipe size hint passed as `n` to the internal `read()` calls the
    /// flow loop makes. `None` means "whatever's buffered".
    pub chunk_size: Option<usize>,
}

impl Default for PipeOptions {
    fn default() -> Self {
        PipeOptions {
            end: true,
            chunk_size: None,
        }
    }
}

pub(crate) struct PipeEntry {
    pub(crate) handle: SinkHandle,
    pub(crate) sink: Box<dyn Sink>,
    pub(crate) end_on_finish: bool,
}
