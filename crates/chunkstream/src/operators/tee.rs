//! `Tee(consumers...)` — the primary stream is returned; every secondary
//! `Writer` also observes every chunk (spec §4.6).
//!
//! Secondary delivery is asynchronous and unordered with respect to the
//! primary (spec §4.6), so each secondary write is spawned rather than
//! awaited inline — the same isolation the multiplexer gives its
//! consumers, in operator form.

use super::output_channel;
use crate::reader::Reader;
use crate::writer::Writer;
use chunkstream_core::StreamOptions;
use std::sync::Arc;

pub fn tee(mut source: Reader, options: StreamOptions, secondary: Vec<Arc<Writer>>) -> Reader {
    let (writer, reader) = output_channel(options);

    tokio::spawn(async move {
        loop {
            match source.next().await {
                // Swallow the source's terminal on both the primary and
                // secondary outputs; each stream's own `close()` emits its
                // one true terminal.
                Ok(Some(chunk)) if chunk.is_last => break,
                Ok(Some(chunk)) => {
                    for secondary_writer in &secondary {
                        let secondary_writer = Arc::clone(secondary_writer);
                        let chunk = chunk.clone();
                        tokio::spawn(async move {
                            let _ = secondary_writer.write_chunk(chunk).await;
                        });
                    }
                    if writer.write_chunk(chunk).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
        for secondary_writer in &secondary {
            let _ = secondary_writer.close().await;
        }
        let _ = writer.close().await;
    });

    reader
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn secondary_consumers_see_every_chunk() {
        let (source_writer, source_reader) = crate::channel(StreamOptions::default());
        let (secondary_writer, mut secondary_reader) = crate::channel(StreamOptions::default());
        let secondary_writer = Arc::new(secondary_writer);

        let primary = tee(source_reader, StreamOptions::default(), vec![secondary_writer]);

        source_writer.write_text("a").await.unwrap();
        source_writer.write_text("b").await.unwrap();
        source_writer.close().await.unwrap();

        let mut primary = primary;
        let primary_text = primary.collect_text().await.value;
        assert_eq!(primary_text, "ab");

        let secondary_text = secondary_reader.collect_text().await.value;
        assert_eq!(secondary_text, "ab");
    }
}
