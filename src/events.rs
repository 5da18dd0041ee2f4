//! A small named-event emitter.
//!
//! The core needs to expose `on`/`once` without pulling in a full generic
//! pub-sub library, so this is a minimal, purpose-built version: one
//! `EventKind` enum instead of string names, and no `removeListener`-by-
//! identity (listeners are removed in bulk per event kind, which is all
//! `Readable`/`Wrapped` ever need). Grounded on the closure-registration
//! pattern in `Stream::on_buffered_amount_low` and
//! `DataChannel::on_open`/`on_message` (a boxed `FnMut` stored behind a
//! handle), adapted here to a single-owner (non-`Arc`) core, so a plain
//! `Vec` replaces `ArcSwapOption<Mutex<_>>`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::error::Error;
use crate::pipe::SinkHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Readable,
    Data,
    End,
    Error,
    Pipe,
    Unpipe,
}

/// `Error` carries a boxed source and isn't `Clone`; listeners only ever
/// need to observe it, so it's shared via `Arc` rather than cloned.
#[derive(Clone)]
pub enum Event {
    Readable,
    Data(Chunk),
    End,
    Error(Arc<Error>),
    Pipe(SinkHandle),
    Unpipe(SinkHandle),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Readable => EventKind::Readable,
            Event::Data(_) => EventKind::Data,
            Event::End => EventKind::End,
            Event::Error(_) => EventKind::Error,
            Event::Pipe(_) => EventKind::Pipe,
            Event::Unpipe(_) => EventKind::Unpipe,
        }
    }
}

pub type Handler = Box<dyn FnMut(&Event) + Send>;

#[derive(Default)]
pub struct EventEmitter {
    listeners: HashMap<EventKind, Vec<(Handler, bool)>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, handler: Handler) {
        self.listeners.entry(kind).or_default().push((handler, false));
    }

    pub fn once(&mut self, kind: EventKind, handler: Handler) {
        self.listeners.entry(kind).or_default().push((handler, true));
    }

    pub fn remove_all_listeners(&mut self, kind: EventKind) {
        self.listeners.remove(&kind);
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners
            .get(&kind)
            .map(|handlers| !handlers.is_empty())
            .unwrap_or(false)
    }

    pub fn emit(&mut self, event: Event) {
        let kind = event.kind();
        if let Some(handlers) = self.listeners.get_mut(&kind) {
            for (handler, _) in handlers.iter_mut() {
                handler(&event);
            }
            handlers.retain(|(_, once)| !once);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn once_fires_a_single_time() {
        let mut emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        emitter.once(EventKind::Readable, Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        emitter.emit(Event::Readable);
        emitter.emit(Event::Readable);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_fires_every_time() {
        let mut emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        emitter.on(EventKind::End, Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        emitter.emit(Event::End);
        emitter.emit(Event::End);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
