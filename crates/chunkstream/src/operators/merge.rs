//! `Merge(streams...)` — one reader task per input, forwarding to a single
//! output; closes when every input has drained (spec §4.6).
//!
//! Ordering across inputs is unspecified; ordering within one input is
//! preserved, since each input keeps its own dedicated task reading in
//! sequence.

use super::output_channel;
use crate::reader::Reader;
use chunkstream_core::StreamOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn merge(sources: Vec<Reader>, options: StreamOptions) -> Reader {
    let (writer, reader) = output_channel(options);
    let writer = Arc::new(writer);

    if sources.is_empty() {
        let writer = Arc::clone(&writer);
        tokio::spawn(async move {
            let _ = writer.close().await;
        });
        return reader;
    }

    let remaining = Arc::new(AtomicUsize::new(sources.len()));

    for mut source in sources {
        let writer = Arc::clone(&writer);
        let remaining = Arc::clone(&remaining);
        tokio::spawn(async move {
            loop {
                match source.next().await {
                    // Each input's own terminal sentinel is swallowed here;
                    // the merged output emits exactly one, from `close()`.
                    Ok(Some(chunk)) if chunk.is_last => break,
                    Ok(Some(chunk)) => {
                        if writer.write_chunk(chunk).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let _ = writer.close().await;
            }
        });
    }

    reader
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn merge_forwards_every_chunk_from_every_input() {
        let (writer_a, reader_a) = crate::channel(StreamOptions::default());
        let (writer_b, reader_b) = crate::channel(StreamOptions::default());

        let merged = merge(vec![reader_a, reader_b], StreamOptions::default());

        writer_a.write_text("a1").await.unwrap();
        writer_a.write_text("a2").await.unwrap();
        writer_a.close().await.unwrap();
        writer_b.write_text("b1").await.unwrap();
        writer_b.close().await.unwrap();

        let mut merged = merged;
        let partial = merged.collect().await;
        let texts: HashSet<_> = partial
            .value
            .iter()
            .filter_map(|c| c.text.clone())
            .collect();
        assert_eq!(
            texts,
            HashSet::from(["a1".to_string(), "a2".to_string(), "b1".to_string()])
        );
    }

    #[tokio::test]
    async fn merge_of_zero_inputs_ends_immediately() {
        let merged: Reader = merge(vec![], StreamOptions::default());
        let mut merged = merged;
        assert!(merged.next().await.unwrap().unwrap().is_last);
    }
}
