//! The byte-producing side of the stream: a caller-supplied fill operation
//! that hands back the next chunk, synchronously or asynchronously.
//!
//! Rather than a boolean `sync` flag toggled after the fill call returns,
//! the sync/async distinction falls straight out of `Poll`: a `Producer`
//! that resolves on its very first `poll_read` call is the synchronous case
//! (the caller already has the bytes in hand, no `readable` event is
//! needed); one that returns `Poll::Pending` first is the asynchronous
//! case, and the engine is woken through the ordinary `Waker` machinery
//! when more data (or EOF) is ready. This mirrors
//! `tokio::io::AsyncRead`/`futures::Stream::poll_next`, which `sctp::Stream`
//! itself is built on (`impl AsyncRead for sctp::stream::Stream`).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;

use crate::error::Result;

/// `None`, or an empty `Bytes`, signals end-of-stream.
pub trait Producer: Send {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, n: usize) -> Poll<Result<Option<Bytes>>>;
}

/// A producer over a fixed, pre-chunked byte sequence — useful for tests
/// that want a producer resolving synchronously every time, and as a
/// minimal real implementation for callers who already have all their
/// bytes in memory.
pub struct MemoryProducer {
    chunks: std::collections::VecDeque<Bytes>,
}

impl MemoryProducer {
    pub fn new<I: IntoIterator<Item = Bytes>>(chunks: I) -> Self {
        MemoryProducer {
            chunks: chunks.into_iter().collect(),
        }
    }
}

impl Producer for MemoryProducer {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _n: usize) -> Poll<Result<Option<Bytes>>> {
        let this = self.get_mut();
        Poll::Ready(Ok(this.chunks.pop_front()))
    }
}
