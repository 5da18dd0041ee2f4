use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use readable_core::{
    Chunk, Config, Error, EventKind, MemoryProducer, PipeOptions, Readable, Result, Sink,
    Utf8Decoder,
};

#[tokio::test]
async fn simple_drain_reads_everything_and_emits_end() {
    let producer = MemoryProducer::new([
        Bytes::from_static(b"hello "),
        Bytes::from_static(b"world"),
    ]);
    let mut readable = Readable::new(producer);

    let ended = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ended);
    readable
        .on(
            EventKind::End,
            Box::new(move |_| flag.store(true, Ordering::SeqCst)),
        )
        .unwrap();

    let mut out = Vec::new();
    loop {
        match readable.read(None) {
            Some(chunk) => out.extend_from_slice(chunk.as_bytes().unwrap()),
            None => break,
        }
    }

    assert_eq!(out, b"hello world");
    assert!(ended.load(Ordering::SeqCst));
    // further reads stay empty, end isn't re-emitted.
    assert!(readable.read(None).is_none());
}

#[tokio::test]
async fn exact_size_reads_span_chunk_boundaries() {
    let producer = MemoryProducer::new([
        Bytes::from_static(b"ab"),
        Bytes::from_static(b"cd"),
        Bytes::from_static(b"ef"),
    ]);
    let mut readable = Readable::new(producer);

    let first = readable.read(Some(3)).unwrap();
    assert_eq!(first.as_bytes().unwrap().as_ref(), b"abc");
    let second = readable.read(Some(3)).unwrap();
    assert_eq!(second.as_bytes().unwrap().as_ref(), b"def");
    assert!(readable.read(Some(1)).is_none());
}

#[tokio::test]
async fn requesting_more_than_remains_after_end_returns_the_remainder() {
    let producer = MemoryProducer::new([Bytes::from_static(b"abc")]);
    let mut readable = Readable::new(producer);

    // A synchronous producer: by the time read() returns, end is already
    // known, so asking for more than remains still comes back immediately
    // with whatever is left rather than None.
    let chunk = readable.read(Some(100)).unwrap();
    assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"abc");
    assert!(readable.read(Some(1)).is_none());
}

struct RecordingSink {
    received: Arc<Mutex<Vec<u8>>>,
    blocks_next_write: Arc<Mutex<bool>>,
    ended: Arc<Mutex<bool>>,
}

#[async_trait]
impl Sink for RecordingSink {
    async fn write(&mut self, chunk: Chunk) -> Result<bool> {
        self.received
            .lock()
            .unwrap()
            .extend_from_slice(chunk.as_bytes().unwrap());
        let mut blocks = self.blocks_next_write.lock().unwrap();
        if *blocks {
            *blocks = false;
            return Ok(false);
        }
        Ok(true)
    }

    async fn drain(&mut self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    async fn end(&mut self) -> Result<()> {
        *self.ended.lock().unwrap() = true;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn pipe_awaits_drain_before_sending_more() {
    let producer = MemoryProducer::new([
        Bytes::from_static(b"abc"),
        Bytes::from_static(b"def"),
        Bytes::from_static(b"ghi"),
    ]);
    let mut readable = Readable::new(producer);

    let received = Arc::new(Mutex::new(Vec::new()));
    let ended = Arc::new(Mutex::new(false));
    let sink = RecordingSink {
        received: Arc::clone(&received),
        blocks_next_write: Arc::new(Mutex::new(true)),
        ended: Arc::clone(&ended),
    };
    readable.pipe(Box::new(sink), PipeOptions::default());

    let handle = tokio::spawn(async move {
        readable.run().await;
    });

    tokio::time::advance(Duration::from_millis(200)).await;
    handle.await.unwrap();

    assert_eq!(&received.lock().unwrap()[..], b"abcdefghi");
    assert!(*ended.lock().unwrap());
}

#[tokio::test]
async fn unpipe_stops_further_delivery_to_that_sink() {
    let producer = MemoryProducer::new([Bytes::from_static(b"abc")]);
    let mut readable = Readable::new(producer);

    let unpiped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&unpiped);
    readable
        .on(
            EventKind::Unpipe,
            Box::new(move |_| flag.store(true, Ordering::SeqCst)),
        )
        .unwrap();

    let sink = RecordingSink {
        received: Arc::new(Mutex::new(Vec::new())),
        blocks_next_write: Arc::new(Mutex::new(false)),
        ended: Arc::new(Mutex::new(false)),
    };
    let handle = readable.pipe(Box::new(sink), PipeOptions::default());
    readable.unpipe(Some(handle));

    assert!(unpiped.load(Ordering::SeqCst));
    // run() should return immediately: no pipes left to drive.
    readable.run().await;
}

struct FailingSink;

#[async_trait]
impl Sink for FailingSink {
    async fn write(&mut self, _chunk: Chunk) -> Result<bool> {
        Err(Error::NotImplemented)
    }
}

#[tokio::test]
async fn sink_write_error_is_surfaced_as_an_event() {
    let producer = MemoryProducer::new([Bytes::from_static(b"abc")]);
    let mut readable = Readable::new(producer);

    let saw_error = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&saw_error);
    readable
        .on(
            EventKind::Error,
            Box::new(move |_| flag.store(true, Ordering::SeqCst)),
        )
        .unwrap();

    readable.pipe(Box::new(FailingSink), PipeOptions::default());
    readable.run().await;

    assert!(saw_error.load(Ordering::SeqCst));
}

#[tokio::test]
async fn text_mode_decodes_across_chunk_boundaries() {
    // "é" splits as 0xC3 0xA9 across two producer chunks.
    let producer = MemoryProducer::new([
        Bytes::from_static(&[b'a', 0xC3]),
        Bytes::from_static(&[0xA9, b'b']),
    ]);
    let config = Config::new().decoder(Box::new(Utf8Decoder::default()));
    let mut readable = Readable::with_config(producer, config);

    let mut out = String::new();
    loop {
        match readable.read(None) {
            Some(chunk) => out.push_str(chunk.as_text().unwrap()),
            None => break,
        }
    }
    assert_eq!(out, "aéb");
}

#[tokio::test]
async fn dangling_tail_byte_sequence_is_flushed_on_eof() {
    // "€" is 0xE2 0x82 0xAC in utf-8; the producer ends mid-sequence.
    let producer = MemoryProducer::new([Bytes::from_static(&[b'x', 0xE2, 0x82])]);
    let config = Config::new().decoder(Box::new(Utf8Decoder::default()));
    let mut readable = Readable::with_config(producer, config);

    let mut out = String::new();
    loop {
        match readable.read(None) {
            Some(chunk) => out.push_str(chunk.as_text().unwrap()),
            None => break,
        }
    }
    assert_eq!(out, "x\u{FFFD}");
}

#[tokio::test]
async fn pause_and_resume_gate_the_legacy_push_loop() {
    let producer = MemoryProducer::new([
        Bytes::from_static(b"a"),
        Bytes::from_static(b"b"),
        Bytes::from_static(b"c"),
    ]);
    let mut readable = Readable::new(producer);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    readable
        .on(
            EventKind::Data,
            Box::new(move |event| {
                if let readable_core::Event::Data(chunk) = event {
                    s.lock().unwrap().extend_from_slice(chunk.as_bytes().unwrap());
                }
            }),
        )
        .unwrap();

    readable.pause().unwrap();
    assert!(readable.is_paused());
    readable.resume().unwrap();
    assert!(!readable.is_paused());

    tokio::time::timeout(Duration::from_millis(50), readable.run_legacy())
        .await
        .ok();

    assert_eq!(&seen.lock().unwrap()[..], b"abc");
}
