//! Read-state record: buffer, length, watermarks, flags, decoder, pipe
//! list.

use crate::chunk::{Chunk, ChunkList};
use crate::decoder::Decoder;
use crate::pipe::PipeEntry;

pub const DEFAULT_BUFFER_SIZE: usize = 16384;
pub const DEFAULT_LOW_WATER_MARK: usize = 1024;

/// Construction options. Unknown options don't exist in a typed struct the
/// way they would in a duck-typed options bag, so there's nothing to
/// "ignore" here beyond accepting `Default::default()` for anything the
/// caller doesn't set.
pub struct Config {
    pub buffer_size: usize,
    pub low_water_mark: usize,
    pub decoder: Option<Box<dyn Decoder>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buffer_size: DEFAULT_BUFFER_SIZE,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            decoder: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n;
        self
    }

    /// Explicit zero is honored, unlike `buffer_size` there's no sentinel
    /// confusion here because this setter always overrides the default.
    pub fn low_water_mark(mut self, n: usize) -> Self {
        self.low_water_mark = n;
        self
    }

    pub fn decoder(mut self, decoder: Box<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }
}

pub(crate) struct ReadableState {
    pub(crate) buffer: ChunkList<Chunk>,
    pub(crate) buffer_size: usize,
    pub(crate) low_water_mark: usize,
    pub(crate) length: usize,
    pub(crate) flowing: bool,
    pub(crate) ended: bool,
    pub(crate) end_emitted: bool,
    pub(crate) reading: bool,
    pub(crate) need_readable: bool,
    pub(crate) decoder: Option<Box<dyn Decoder>>,
    pub(crate) pipes: Vec<PipeEntry>,
}

impl ReadableState {
    pub(crate) fn new(config: Config) -> Self {
        ReadableState {
            buffer: ChunkList::new(),
            buffer_size: config.buffer_size,
            low_water_mark: config.low_water_mark,
            length: 0,
            flowing: false,
            ended: false,
            end_emitted: false,
            reading: false,
            need_readable: false,
            decoder: config.decoder,
            pipes: Vec::new(),
        }
    }
}
