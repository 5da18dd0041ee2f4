use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core state machine.
///
/// Back-pressure stalls and repeated `end` finalization are not represented
/// here: per the producer/sink contract they are not error conditions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("producer reported an error: {0}")]
    Producer(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("_read is not implemented")]
    NotImplemented,

    #[error("cannot switch to legacy data-event mode while flowing")]
    IllegalModeTransition,

    #[error("sink rejected write: {0}")]
    SinkWrite(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("sink rejected end(): {0}")]
    SinkEnd(#[source] Box<dyn std::error::Error + Send + Sync>),
}
