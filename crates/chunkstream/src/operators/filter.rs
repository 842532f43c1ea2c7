//! `Filter` — forward only chunks matching a predicate (spec §4.6).

use super::output_channel;
use crate::reader::Reader;
use chunkstream_core::StreamOptions;

/// The source's terminal sentinel is swallowed regardless of `predicate`;
/// `close()` below emits the one true terminal for this operator's own
/// output stream (spec §4.6).
pub fn filter<F>(mut source: Reader, options: StreamOptions, predicate: F) -> Reader
where
    F: Fn(&chunkstream_core::Chunk) -> bool + Send + 'static,
{
    let (writer, reader) = output_channel(options);

    tokio::spawn(async move {
        loop {
            match source.next().await {
                Ok(Some(chunk)) if chunk.is_last => break,
                Ok(Some(chunk)) => {
                    if predicate(&chunk) && writer.write_chunk(chunk).await.is_err() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn predicate_true_is_observationally_the_identity_operator() {
        let (source_writer, source_reader) = crate::channel(StreamOptions::default());
        let filtered = filter(source_reader, StreamOptions::default(), |_| true);

        source_writer.write_text("a").await.unwrap();
        source_writer.write_text("b").await.unwrap();
        source_writer.close().await.unwrap();

        let mut filtered = filtered;
        let partial = filtered.collect_text().await;
        assert_eq!(partial.value, "ab");
    }

    #[tokio::test]
    async fn filter_drops_non_matching_chunks_but_keeps_terminal() {
        let (source_writer, source_reader) = crate::channel(StreamOptions::default());
        let filtered = filter(source_reader, StreamOptions::default(), |c| {
            c.text.as_deref() == Some("keep")
        });

        source_writer.write_text("drop").await.unwrap();
        source_writer.write_text("keep").await.unwrap();
        source_writer.close().await.unwrap();

        let mut filtered = filtered;
        let partial = filtered.collect_text().await;
        assert_eq!(partial.value, "keep");
    }
}
