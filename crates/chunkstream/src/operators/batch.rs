//! `Batch(n, timeout)` — collect up to `n` chunks or until `timeout` fires,
//! then emit one JSON-typed chunk (spec §4.6).
//!
//! Reuses a single reset-able timer across iterations rather than
//! allocating a new one per batch window (spec §9: "Throttle, chunk-delay,
//! and Batch must reuse a single reset-able timer").

use super::output_channel;
use crate::reader::Reader;
use crate::writer::Writer;
use chunkstream_core::{Chunk, StreamOptions};
use serde_json::json;
use std::time::Duration;

async fn flush(writer: &Writer, items: &mut Vec<Chunk>) -> Result<(), chunkstream_core::StreamError> {
    if items.is_empty() {
        return Ok(());
    }
    let batch = std::mem::take(items);
    let payload = json!({ "batch_size": batch.len(), "items": batch });
    writer.write_chunk(Chunk::json(payload)).await
}

pub fn batch(mut source: Reader, options: StreamOptions, n: usize, timeout: Duration) -> Reader {
    let (writer, reader) = output_channel(options);
    let has_timeout = !timeout.is_zero();
    let n = n.max(1);

    tokio::spawn(async move {
        let mut items: Vec<Chunk> = Vec::with_capacity(n);
        let deadline = tokio::time::sleep(timeout.max(Duration::from_millis(1)));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = source.next() => {
                    match next {
                        Ok(Some(chunk)) => {
                            if chunk.is_last {
                                // Flush any partial batch; swallow the
                                // source's own terminal so `close()` below
                                // is the sole emitter of this stream's
                                // terminal sentinel.
                                let _ = flush(&writer, &mut items).await;
                                break;
                            }
                            items.push(chunk);
                            if items.len() >= n {
                                let _ = flush(&writer, &mut items).await;
                                if has_timeout {
                                    deadline.as_mut().reset(tokio::time::Instant::now() + timeout);
                                }
                            }
                        }
                        Ok(None) => {
                            let _ = flush(&writer, &mut items).await;
                            break;
                        }
                        Err(_) => {
                            let _ = flush(&writer, &mut items).await;
                            break;
                        }
                    }
                }
                () = &mut deadline, if has_timeout && !items.is_empty() => {
                    let _ = flush(&writer, &mut items).await;
                    deadline.as_mut().reset(tokio::time::Instant::now() + timeout);
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
    async fn batches_by_size() {
        let (source_writer, source_reader) = crate::channel(StreamOptions::default());
        let batched = batch(source_reader, StreamOptions::default(), 2, Duration::ZERO);

        for i in 0..4 {
            source_writer.write_text(format!("{i}")).await.unwrap();
        }
        source_writer.close().await.unwrap();

        let mut batched = batched;
        let partial = batched.collect().await;
        // Two size-2 batches, plus the single terminal chunk `close()`
        // emits for this operator's own output stream.
        assert_eq!(partial.value.len(), 3);
        assert!(partial.value[0].data.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_flushes_on_timeout() {
        let (source_writer, source_reader) = crate::channel(StreamOptions::default());
        let batched = batch(
            source_reader,
            StreamOptions::default(),
            10,
            Duration::from_millis(50),
        );

        source_writer.write_text("only one").await.unwrap();
        tokio::time::advance(Duration::from_millis(60)).await;

        let mut batched = batched;
        let first = batched.next().await.unwrap().unwrap();
        let data = first.data.unwrap();
        assert_eq!(data["batch_size"], 1);
    }
}
