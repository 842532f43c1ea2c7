//! `Buffer(minSize, maxSize, threshold)` — a larger channel in front of the
//! source for throughput smoothing, without reordering or dropping
//! non-`isLast` chunks (spec §4.6).
//!
//! `tokio::sync::mpsc` channels are fixed-capacity once created, so this
//! does not resize dynamically at runtime; the operator sizes its output
//! channel at `max(minSize, maxSize)` up front. `threshold` is accepted for
//! interface parity with the spec but unused by this static strategy.

use super::output_channel;
use crate::reader::Reader;
use chunkstream_core::StreamOptions;

pub fn buffer(
    mut source: Reader,
    options: StreamOptions,
    min_size: usize,
    max_size: usize,
    _threshold: f64,
) -> Reader {
    let buffer_size = min_size.max(max_size).max(1);
    let (writer, reader) = output_channel(StreamOptions {
        buffer_size,
        ..options
    });

    tokio::spawn(async move {
        loop {
            match source.next().await {
                // Swallow the source's terminal; `close()` below emits the
                // one true terminal for this operator's output stream.
                Ok(Some(chunk)) if chunk.is_last => break,
                Ok(Some(chunk)) => {
                    if writer.write_chunk(chunk).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
        let _ = writer.close().await;
    });

    reader
}
