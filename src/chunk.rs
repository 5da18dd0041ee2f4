//! An ordered queue of chunks with O(1) push and a `take` operation that
//! preserves byte order across chunk boundaries.
//!
//! Modeled on `PendingQueue`'s `VecDeque<ChunkPayloadData>` plus a running
//! byte counter, but single-owner rather than `Mutex`-guarded: the core
//! drives this from one place, so no locking is needed.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// A unit the accumulator can hold: something with a length that can be
/// split into a prefix/suffix pair and re-joined.
pub trait Piece: Sized {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Remove and return the first `n` units, leaving `self` as the
    /// remainder. `n` is guaranteed `0 < n < self.len()`.
    fn take_prefix(&mut self, n: usize) -> Self;
    /// Join pieces taken from the front of the list, in order.
    fn concat(pieces: Vec<Self>) -> Self;
}

impl Piece for Bytes {
    fn len(&self) -> usize {
        Bytes::len(self)
    }

    fn take_prefix(&mut self, n: usize) -> Self {
        self.split_to(n)
    }

    fn concat(pieces: Vec<Self>) -> Self {
        if pieces.len() == 1 {
            return pieces.into_iter().next().unwrap();
        }
        let mut out = BytesMut::with_capacity(pieces.iter().map(Bytes::len).sum());
        for p in pieces {
            out.extend_from_slice(&p);
        }
        out.freeze()
    }
}

/// Either a raw byte chunk or a decoded text fragment, depending on whether
/// the stream has an encoding configured. A single `ChunkList` only ever
/// holds one variant at a time: `Readable::set_encoding` drains and
/// re-decodes any buffered bytes at the moment the decoder is attached.
#[derive(Debug, Clone)]
pub enum Chunk {
    Bytes(Bytes),
    Text(String),
}

impl Chunk {
    pub fn len(&self) -> usize {
        match self {
            Chunk::Bytes(b) => b.len(),
            // Text mode counts Unicode scalar values, not UTF-8 bytes: a
            // chunk may contain multi-byte code points and `n` in `read(n)`
            // should mean "characters" when decoding, mirroring how the
            // length of a JS string is a UTF-16 unit count rather than a
            // byte count.
            Chunk::Text(s) => s.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Chunk::Bytes(b) => Some(b),
            Chunk::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Chunk::Text(s) => Some(s),
            Chunk::Bytes(_) => None,
        }
    }
}

impl Piece for Chunk {
    fn len(&self) -> usize {
        Chunk::len(self)
    }

    fn take_prefix(&mut self, n: usize) -> Self {
        match self {
            Chunk::Bytes(b) => Chunk::Bytes(b.take_prefix(n)),
            Chunk::Text(s) => {
                let idx = s
                    .char_indices()
                    .nth(n)
                    .map(|(i, _)| i)
                    .unwrap_or(s.len());
                let suffix = s.split_off(idx);
                Chunk::Text(std::mem::replace(s, suffix))
            }
        }
    }

    fn concat(pieces: Vec<Self>) -> Self {
        if pieces.is_empty() {
            return Chunk::Bytes(Bytes::new());
        }
        if matches!(pieces[0], Chunk::Text(_)) {
            let mut out = String::new();
            for p in pieces {
                if let Chunk::Text(s) = p {
                    out.push_str(&s);
                }
            }
            Chunk::Text(out)
        } else {
            let mut out = BytesMut::new();
            for p in pieces {
                if let Chunk::Bytes(b) = p {
                    out.extend_from_slice(&b);
                }
            }
            Chunk::Bytes(out.freeze())
        }
    }
}

/// The accumulator itself.
#[derive(Debug, Default)]
pub struct ChunkList<C: Piece> {
    chunks: VecDeque<C>,
}

impl<C: Piece> ChunkList<C> {
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Appends a chunk. Empty chunks are dropped rather than stored, so the
    /// `length == 0 iff empty list` invariant never needs a separate check.
    pub fn push(&mut self, chunk: C) {
        if !chunk.is_empty() {
            self.chunks.push_back(chunk);
        }
    }

    /// Removes and returns up to `n` units from the front of the list,
    /// joining across chunk boundaries as needed. `None`, `Some(0)`, or an
    /// `n` that reaches or exceeds `length` drains everything buffered.
    ///
    /// `length` is the caller's running total, tracked alongside the list
    /// (`ReadableState.length`) rather than recomputed here.
    pub fn take(&mut self, n: Option<usize>, length: usize) -> Option<C> {
        if self.chunks.is_empty() {
            return None;
        }

        // usize has no negative values, so "non-positive" collapses to the
        // n == 0 case; "unspecified" and "n >= length" behave identically.
        let drain_all = match n {
            None => true,
            Some(0) => true,
            Some(n) => n >= length,
        };
        if drain_all {
            return Some(self.drain_all());
        }
        let n = n.unwrap();

        let first_len = self.chunks[0].len();
        if n < first_len {
            return Some(self.chunks[0].take_prefix(n));
        }
        if n == first_len {
            return self.chunks.pop_front();
        }

        let mut remaining = n;
        let mut pieces = Vec::new();
        while remaining > 0 {
            let front_len = self.chunks[0].len();
            if front_len <= remaining {
                pieces.push(self.chunks.pop_front().expect("non-empty list"));
                remaining -= front_len;
            } else {
                pieces.push(self.chunks[0].take_prefix(remaining));
                remaining = 0;
            }
        }
        Some(C::concat(pieces))
    }

    fn drain_all(&mut self) -> C {
        let pieces: Vec<C> = self.chunks.drain(..).collect();
        C::concat(pieces)
    }
}
