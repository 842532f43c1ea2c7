//! `Map` — apply a pure `chunk -> chunk` function (spec §4.6).

use super::output_channel;
use crate::reader::Reader;
use chunkstream_core::{Chunk, Component, StreamOptions};

/// Applies `f` to every chunk. Errors from `f` are emitted as `Error`
/// chunks rather than terminating the stream, matching the spec's
/// operator-error policy ("errors from operator transforms are surfaced as
/// Error chunks to downstream readers and do not terminate the stream
/// unless the source itself ends").
pub fn map<F>(mut source: Reader, options: StreamOptions, f: F) -> Reader
where
    F: Fn(Chunk) -> Result<Chunk, String> + Send + 'static,
{
    let (writer, reader) = output_channel(options);

    tokio::spawn(async move {
        loop {
            match source.next().await {
                Ok(Some(chunk)) => {
                    // Swallow the source's terminal sentinel here; `close()`
                    // below emits the one true terminal for this operator's
                    // own output stream.
                    if chunk.is_last {
                        break;
                    }
                    let mapped = f(chunk);
                    let result = match mapped {
                        Ok(chunk) => writer.write_chunk(chunk).await,
                        Err(reason) => {
                            writer
                                .write_chunk(Chunk::error(format!(
                                    "{}: map failed: {reason}",
                                    Component::Operator
                                )))
                                .await
                        }
                    };
                    if result.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }
        let _ = writer.close().await;
    });

    reader
}
