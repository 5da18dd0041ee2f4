//! Mode switch bookkeeping and the `wrap()` adapter for pre-existing
//! push-style sources.
//!
//! Mode is a tagged variant rather than a prototype rewrite: `Readable`
//! tracks an optional `LegacyState` alongside its normal pull/flowing
//! state, and switching is irreversible (there's no way to clear
//! `LegacyState` once set). `wrap()` is deliberately a *different* type
//! (`Wrapped<T>`) with its own self-contained `read`, rather than a variant
//! layered on `Readable`'s main engine, since a push source's own pacing
//! has nothing in common with the pull engine's `reading`/producer-poll
//! bookkeeping.

use async_trait::async_trait;
use bytes::Bytes;

use crate::chunk::{Chunk, ChunkList};
use crate::error::{Error, Result};
use crate::events::{Event, EventEmitter, EventKind, Handler};
use crate::state::DEFAULT_LOW_WATER_MARK;

/// Local mode state for a `Readable` that has been switched to legacy
/// data-event emulation. Once created it is never removed.
#[derive(Debug, Default)]
pub(crate) struct LegacyState {
    pub(crate) paused: bool,
    pub(crate) primed: bool,
}

/// The observable contract of an external push-stream being adapted by
/// `wrap()`: it pushes `Data`/`End`/`Error` on its own schedule and honors
/// `pause`/`resume` as a courtesy.
#[async_trait]
pub trait LegacyPushSource: Send {
    async fn next_event(&mut self) -> LegacyEvent;
    fn pause(&mut self);
    fn resume(&mut self);
}

pub enum LegacyEvent {
    Data(Bytes),
    End,
    Error(Box<dyn std::error::Error + Send + Sync>),
}

/// Adapter produced by `Readable::wrap`. Self-contained: it does not go
/// through `Producer`/`ReadableState` at all.
pub struct Wrapped<T: LegacyPushSource> {
    old: T,
    buffer: ChunkList<Chunk>,
    length: usize,
    low_water_mark: usize,
    ended: bool,
    end_emitted: bool,
    old_paused: bool,
    events: EventEmitter,
}

impl<T: LegacyPushSource> Wrapped<T> {
    pub fn new(old: T) -> Self {
        Wrapped {
            old,
            buffer: ChunkList::new(),
            length: 0,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            ended: false,
            end_emitted: false,
            old_paused: false,
            events: EventEmitter::new(),
        }
    }

    pub fn low_water_mark(mut self, n: usize) -> Self {
        self.low_water_mark = n;
        self
    }

    pub fn on(&mut self, kind: EventKind, handler: Handler) {
        self.events.on(kind, handler);
    }

    pub fn once(&mut self, kind: EventKind, handler: Handler) {
        self.events.once(kind, handler);
    }

    /// Serve from the buffer directly, then resume the wrapped source if we
    /// dropped back below the low water mark.
    pub fn read(&mut self, n: Option<usize>) -> Option<Chunk> {
        if self.buffer.is_empty() && self.ended {
            self.finalize_end();
            return None;
        }
        let available = match n {
            None => self.length,
            Some(n) => n.min(self.length),
        };
        let result = if available > 0 {
            self.buffer.take(Some(available), self.length)
        } else {
            None
        };
        let returned = result.as_ref().map(Chunk::len).unwrap_or(0);
        self.length -= returned;

        if self.length <= self.low_water_mark && self.old_paused {
            self.old.resume();
            self.old_paused = false;
        }
        result
    }

    /// Drives the wrapped source until it ends or errors. Intended to run
    /// as a background task the caller awaits alongside their own `read()`
    /// calls, relying on the old stream's own event loop to push
    /// `data`/`end`.
    pub async fn pump(&mut self) -> Result<()> {
        loop {
            match self.old.next_event().await {
                LegacyEvent::Data(bytes) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    let len = bytes.len();
                    self.buffer.push(Chunk::Bytes(bytes));
                    self.length += len;
                    self.events.emit(Event::Readable);

                    if self.length > self.low_water_mark && !self.old_paused {
                        self.old.pause();
                        self.old_paused = true;
                    }
                }
                LegacyEvent::End => {
                    self.ended = true;
                    if self.buffer.is_empty() {
                        self.finalize_end();
                    }
                    return Ok(());
                }
                LegacyEvent::Error(e) => {
                    let err = Error::Producer(e);
                    self.events
                        .emit(Event::Error(std::sync::Arc::new(err)));
                    return Ok(());
                }
            }
        }
    }

    fn finalize_end(&mut self) {
        if self.end_emitted {
            return;
        }
        self.ended = true;
        self.end_emitted = true;
        self.events.emit(Event::End);
    }
}
