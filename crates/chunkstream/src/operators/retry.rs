//! `Retry(maxRetries, backoff)` — on a read error from the source, sleep
//! exponentially and retry; after exhaustion, emit an Error chunk and end
//! (spec §4.6).
//!
//! Backoff schedule mirrors `resilient_exporter::RetryConfig`
//! (`initial_delay * multiplier^attempt`), specialized to the spec's fixed
//! `backoff * 2^i` growth.

use super::output_channel;
use crate::reader::Reader;
use chunkstream_core::{Chunk, StreamOptions};
use std::time::Duration;

pub fn retry(mut source: Reader, options: StreamOptions, max_retries: u32, backoff: Duration) -> Reader {
    let (writer, reader) = output_channel(options);

    tokio::spawn(async move {
        let mut attempt = 0u32;
        loop {
            match source.next().await {
                // Swallow the source's terminal; `close()` below emits the
                // one true terminal for this operator's output stream.
                Ok(Some(chunk)) if chunk.is_last => break,
                Ok(Some(chunk)) => {
                    attempt = 0;
                    if writer.write_chunk(chunk).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) if error.is_terminal() => break,
                Err(_) if attempt < max_retries => {
                    let delay = backoff.saturating_mul(1 << attempt.min(20));
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(_) => {
                    let _ = writer
                        .write_chunk(Chunk::error("retry attempts exhausted"))
                        .await;
                    break;
                }
            }
        }
        let _ = writer.close().await;
    });

    reader
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_transient_read_error_is_retried_and_recovered() {
        let (source_writer, source_reader) = crate::channel(StreamOptions::default());
        let retried = retry(
            source_reader,
            StreamOptions::default(),
            2,
            Duration::from_millis(1),
        );

        source_writer.write_error("transient").await.unwrap();
        source_writer.write_text("recovered").await.unwrap();
        source_writer.close().await.unwrap();

        let mut retried = retried;
        let first = retried.next().await.unwrap().unwrap();
        assert_eq!(first.text.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn exhausted_retries_emit_an_error_chunk_and_end() {
        let (source_writer, source_reader) = crate::channel(StreamOptions::default());
        let retried = retry(source_reader, StreamOptions::default(), 0, Duration::ZERO);

        source_writer.write_error("persistent").await.unwrap();
        source_writer.close().await.unwrap();

        let mut retried = retried;
        let first = retried.next().await;
        assert!(first.is_err());
    }
}
