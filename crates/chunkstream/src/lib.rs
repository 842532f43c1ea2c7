//! Bounded, ordered, cancellable chunk streams.
//!
//! A producer owns a [`Writer`]; the `Writer` pushes [`Chunk`]s into a
//! bounded channel and a [`Reader`] pulls them out. [`operators`] wrap a
//! source `Reader` into a new `Reader`. [`Multiplexer`] wraps a source
//! `Reader` and exposes many independent consumer endpoints. The
//! `transport` feature adds SSE / chunked-HTTP / WebSocket / polling
//! framing on top of a `Reader`.

pub mod eventbus;
pub mod multiplexer;
pub mod operators;
pub mod progress;
pub mod reader;
mod shutdown;
mod stats;
#[cfg(feature = "transport")]
pub mod transport;
pub mod writer;

pub use chunkstream_core::{
    Chunk, ChunkError, ChunkType, Component, Metadata, ObjectPool, RingBuffer, StreamError,
    StreamOptions,
};
pub use multiplexer::{ConsumerCallbacks, ConsumerCallbacksBoxed, Multiplexer, MultiplexerStats};
pub use progress::ProgressTracker;
pub use reader::{Partial, Reader};
pub use stats::{ReaderStats, StreamState, WriterStats};
pub use writer::{Transform, Writer};

use shutdown::ShutdownSignal;
use tokio::sync::mpsc;

/// Creates a connected `Writer`/`Reader` pair backed by a bounded channel of
/// capacity `options.buffer_size` (spec §2: "a producer owns a Writer; the
/// Writer pushes Chunks into a bounded channel; a Reader pulls Chunks out").
pub fn channel(options: StreamOptions) -> (Writer, Reader) {
    channel_with_transform(options, None)
}

/// Same as [`channel`], with a transform function applied to every chunk at
/// the `Writer` (spec §3: `enableTransform` + `transformFunc`).
pub fn channel_with_transform(
    options: StreamOptions,
    transform: Option<Transform>,
) -> (Writer, Reader) {
    let (tx, rx) = mpsc::channel(options.buffer_size.max(1));
    let shutdown = ShutdownSignal::new();
    let writer = Writer::new(tx, &options, transform, shutdown.clone());
    let reader = Reader::new(rx, options, shutdown);
    (writer, reader)
}
