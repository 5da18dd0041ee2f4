//! The readable core itself: ties the accumulator, read-state, producer
//! protocol, pull-read engine, pipe engine, mode switch and end-of-stream
//! finalizer together behind the public consumer surface.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;

use crate::chunk::Chunk;
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::events::{Event, EventEmitter, EventKind, Handler};
use crate::mode::LegacyState;
use crate::pipe::{PipeEntry, PipeOptions, Sink, SinkHandle};
use crate::producer::Producer;
use crate::state::{Config, ReadableState};

/// The readable core. Owns its producer, buffer, and pipe destinations
/// exclusively — `&mut self` throughout, rather than `Arc<Mutex<_>>` like
/// `sctp::Stream`, since nothing here needs to be shared across tasks on
/// its own; a caller that wants fan-out can wrap a `Readable` in its own
/// `Arc<tokio::sync::Mutex<_>>` at the call site.
pub struct Readable<P: Producer + Unpin> {
    producer: P,
    state: ReadableState,
    events: EventEmitter,
    legacy: Option<LegacyState>,
    next_sink_id: u64,
    flow_chunk_size: Option<usize>,
    pending_end: bool,
}

impl<P: Producer + Unpin> Readable<P> {
    pub fn new(producer: P) -> Self {
        Self::with_config(producer, Config::default())
    }

    pub fn with_config(producer: P, config: Config) -> Self {
        Readable {
            producer,
            state: ReadableState::new(config),
            events: EventEmitter::new(),
            legacy: None,
            next_sink_id: 0,
            flow_chunk_size: None,
            pending_end: false,
        }
    }

    // ---- consumer surface ----------------------------------------------

    /// Pull up to `n` bytes. `None` for `n` returns everything buffered.
    /// Returns `None` when nothing is available right now — the caller
    /// should await `readable()`.
    pub fn read(&mut self, n: Option<usize>) -> Option<Chunk> {
        let out = self.read_inner(n);
        self.flush_pending_end();
        out
    }

    fn read_inner(&mut self, n: Option<usize>) -> Option<Chunk> {
        let plan = self.plan(n);
        if plan == 0 && self.state.ended {
            self.finalize_end();
            return None;
        }

        let should_refill = (self.state.need_readable
            || self.state.length.saturating_sub(plan) <= self.state.low_water_mark)
            && !self.state.ended
            && !self.state.reading;

        let mut available = plan;
        if should_refill {
            self.try_refill_sync();
            if !self.state.reading {
                // the refill resolved synchronously: recompute with fresh state.
                available = self.plan(n);
            }
        }

        let mut result = if available > 0 {
            self.state.buffer.take(Some(available), self.state.length)
        } else {
            None
        };

        let returned_len = match &result {
            Some(chunk) if !chunk.is_empty() => chunk.len(),
            _ => {
                self.state.need_readable = true;
                result = None;
                0
            }
        };
        self.state.length -= returned_len;
        result
    }

    /// Computes how many units the next `take()` should actually request,
    /// flagging `need_readable` when the caller wants more than is
    /// buffered and the source hasn't ended yet.
    fn plan(&mut self, n: Option<usize>) -> usize {
        let length = self.state.length;
        match n {
            None => length,
            Some(0) => 0,
            Some(n) if n > length && !self.state.ended => {
                self.state.need_readable = true;
                0
            }
            Some(n) if n > length => length, // ended: return all remaining bytes
            Some(n) => n,
        }
    }

    /// Completes once the producer has made progress (more data or EOF) and
    /// the internal state has been updated — i.e. the async analogue of
    /// awaiting a `readable` event. A no-op if no read is in flight.
    pub async fn readable(&mut self) {
        futures::future::poll_fn(|cx| self.poll_readable(cx)).await;
        self.flush_pending_end();
    }

    fn poll_readable(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if !self.state.reading {
            return Poll::Ready(());
        }
        let n = self.state.buffer_size;
        match Pin::new(&mut self.producer).poll_read(cx, n) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                self.on_producer_result(result, false);
                Poll::Ready(())
            }
        }
    }

    /// Attempts to complete a fill request without suspending, using a
    /// no-op waker. If the producer resolves immediately this is the
    /// synchronous-producer path; otherwise `state.reading` stays `true`
    /// and the caller must eventually drive completion via
    /// `readable().await`.
    fn try_refill_sync(&mut self) {
        self.state.reading = true;
        let n = self.state.buffer_size;
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        if let Poll::Ready(result) = Pin::new(&mut self.producer).poll_read(&mut cx, n) {
            self.on_producer_result(result, true);
        }
    }

    /// Applies the outcome of a producer poll: decodes/buffers the chunk
    /// (or finalizes end-of-stream), refills eagerly while still under the
    /// low water mark, and emits `readable` when a pending demand is now
    /// satisfiable.
    fn on_producer_result(&mut self, result: Result<Option<Bytes>>, synchronous: bool) {
        self.state.reading = false;

        let chunk = match result {
            Err(e) => {
                self.events.emit(Event::Error(Arc::new(e)));
                return;
            }
            Ok(None) => None,
            Ok(Some(bytes)) if bytes.is_empty() => None,
            Ok(Some(bytes)) => Some(bytes),
        };

        let Some(bytes) = chunk else {
            log::trace!("producer reported end of stream");
            self.state.ended = true;
            if let Some(decoder) = self.state.decoder.as_mut() {
                let tail = decoder.finish();
                if !tail.is_empty() {
                    let chunk = Chunk::Text(tail);
                    self.state.length += chunk.len();
                    self.state.buffer.push(chunk);
                }
            }
            if !synchronous {
                if self.state.length > 0 {
                    self.events.emit(Event::Readable);
                } else {
                    self.finalize_end();
                }
            }
            return;
        };

        let decoded = if let Some(decoder) = self.state.decoder.as_mut() {
            let text = decoder.decode(&bytes);
            if text.is_empty() {
                None
            } else {
                Some(Chunk::Text(text))
            }
        } else {
            Some(Chunk::Bytes(bytes))
        };

        if let Some(chunk) = decoded {
            let len = chunk.len();
            self.state.buffer.push(chunk);
            self.state.length += len;
        }

        if self.state.length <= self.state.low_water_mark && !self.state.ended {
            self.try_refill_sync();
        } else if self.state.need_readable && !synchronous {
            self.state.need_readable = false;
            self.events.emit(Event::Readable);
        }
    }

    /// Marks the stream ended. `end` is queued rather than emitted
    /// immediately and flushed at the tail of whichever public method
    /// observed the transition, so a handler can never observe `end` while
    /// still inside a `read()`/`pipe()`/etc. call on the same stream.
    fn finalize_end(&mut self) {
        if self.state.end_emitted {
            return;
        }
        log::debug!("stream ended, buffer drained");
        self.state.ended = true;
        self.state.end_emitted = true;
        self.pending_end = true;
    }

    fn flush_pending_end(&mut self) {
        if self.pending_end {
            self.pending_end = false;
            self.events.emit(Event::End);
        }
    }

    // ---- configuration -------------------------------------------------

    pub fn set_encoding(&mut self, decoder: Box<dyn Decoder>) {
        // Any bytes already buffered were ingested raw; re-decode them now
        // so the buffer never mixes `Chunk::Bytes` and `Chunk::Text`.
        if !self.state.buffer.is_empty() {
            if let Some(Chunk::Bytes(raw)) = self.state.buffer.take(None, self.state.length) {
                self.state.length -= raw.len();
                let mut decoder = decoder;
                let text = decoder.decode(&raw);
                if !text.is_empty() {
                    self.state.length += text.chars().count();
                    self.state.buffer.push(Chunk::Text(text));
                }
                self.state.decoder = Some(decoder);
                return;
            }
        }
        self.state.decoder = Some(decoder);
    }

    // ---- events ----------------------------------------------------------

    pub fn on(&mut self, kind: EventKind, handler: Handler) -> Result<()> {
        if kind == EventKind::Data {
            self.enter_legacy_mode()?;
        }
        self.events.on(kind, handler);
        self.flush_pending_end();
        Ok(())
    }

    pub fn once(&mut self, kind: EventKind, handler: Handler) {
        self.events.once(kind, handler);
    }

    // ---- pipe engine -------------------------------------------------------

    pub fn pipe(&mut self, sink: Box<dyn Sink>, opts: PipeOptions) -> SinkHandle {
        let handle = SinkHandle(self.next_sink_id);
        self.next_sink_id += 1;
        log::debug!("registering pipe destination {:?}", handle);
        if self.state.pipes.is_empty() {
            self.flow_chunk_size = opts.chunk_size;
        }
        self.state.pipes.push(PipeEntry {
            handle,
            sink,
            end_on_finish: opts.end,
        });
        self.events.emit(Event::Pipe(handle));
        self.state.flowing = true;
        self.flush_pending_end();
        handle
    }

    pub fn unpipe(&mut self, dest: Option<SinkHandle>) {
        match dest {
            None => {
                for entry in self.state.pipes.drain(..) {
                    self.events.emit(Event::Unpipe(entry.handle));
                }
            }
            Some(handle) => {
                if let Some(pos) = self.state.pipes.iter().position(|p| p.handle == handle) {
                    let entry = self.state.pipes.remove(pos);
                    self.events.emit(Event::Unpipe(entry.handle));
                }
            }
        }
        self.flush_pending_end();
    }

    /// Drives the flow loop to completion: reads, fans out to every pipe,
    /// awaits any `drain` obligations before the next chunk, and ends pipes
    /// when the source ends. Returns once the pipe list is empty or every
    /// pipe has been ended.
    pub async fn run(&mut self) {
        loop {
            if self.state.pipes.is_empty() {
                self.state.flowing = false;
                if self.events.has_listeners(EventKind::Data) {
                    log::debug!("no pipes left but data listeners remain, switching to legacy mode");
                    let _ = self.run_legacy().await;
                }
                return;
            }

            match self.read(self.flow_chunk_size) {
                Some(chunk) => {
                    let mut need_drain = Vec::new();
                    for entry in self.state.pipes.iter_mut() {
                        match entry.sink.write(chunk.clone()).await {
                            Ok(true) => {}
                            Ok(false) => need_drain.push(entry.handle),
                            Err(e) => {
                                self.events.emit(Event::Error(Arc::new(Error::SinkWrite(
                                    Box::new(SinkErrorShim(e)),
                                ))));
                            }
                        }
                    }
                    self.events.emit(Event::Data(chunk));

                    for entry in self.state.pipes.iter_mut() {
                        if need_drain.contains(&entry.handle) {
                            entry.sink.drain().await;
                        }
                    }

                    if self.state.end_emitted {
                        self.end_pipes().await;
                        self.state.flowing = false;
                        return;
                    }
                }
                None => {
                    if self.state.end_emitted {
                        self.end_pipes().await;
                        self.state.flowing = false;
                        return;
                    }
                    self.readable().await;
                }
            }
        }
    }

    async fn end_pipes(&mut self) {
        let mut errors = Vec::new();
        for mut entry in self.state.pipes.drain(..) {
            if entry.end_on_finish {
                if let Err(e) = entry.sink.end().await {
                    errors.push(Error::SinkEnd(Box::new(SinkErrorShim(e))));
                }
            }
        }
        for e in errors {
            self.events.emit(Event::Error(Arc::new(e)));
        }
    }

    // ---- legacy mode switch --------------------------------------------

    fn enter_legacy_mode(&mut self) -> Result<()> {
        if self.state.flowing {
            log::warn!("refusing to switch to legacy mode while flowing");
            return Err(Error::IllegalModeTransition);
        }
        if self.legacy.is_none() {
            log::debug!("switching to legacy data-event mode");
            self.legacy = Some(LegacyState::default());
        }
        let legacy = self.legacy.as_mut().unwrap();
        if !legacy.primed {
            // prime the pump: a single `readable` so a consumer driving
            // itself off `on('readable', ...)` starts pulling immediately,
            // without waiting on whatever triggered the switch.
            legacy.primed = true;
            self.events.emit(Event::Readable);
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.enter_legacy_mode()?;
        self.legacy.as_mut().unwrap().paused = true;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.enter_legacy_mode()?;
        self.legacy.as_mut().unwrap().paused = false;
        if self.state.length > 0 {
            self.events.emit(Event::Readable);
        }
        self.flush_pending_end();
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.legacy.as_ref().map(|l| l.paused).unwrap_or(false)
    }

    /// Drives the legacy push loop: while not paused, reads and emits
    /// `data` until the buffer runs dry, then awaits `readable` again.
    /// Intended to run until the stream ends; callers that only use pull
    /// reads or pipes never need to call this.
    pub async fn run_legacy(&mut self) -> Result<()> {
        self.enter_legacy_mode()?;
        loop {
            if self.is_paused() {
                self.readable().await;
                continue;
            }
            match self.read(None) {
                Some(chunk) => {
                    self.events.emit(Event::Data(chunk));
                }
                None => {
                    if self.state.end_emitted {
                        return Ok(());
                    }
                    self.readable().await;
                }
            }
        }
    }
}

/// `Sink::write`'s error type is an opaque `Box<dyn Error>`; this shim lets
/// it ride inside `Error::SinkWrite`'s boxed-source slot without forcing
/// `Sink` implementors to produce our own `Error` type.
#[derive(Debug)]
struct SinkErrorShim(Error);

impl std::fmt::Display for SinkErrorShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SinkErrorShim {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
