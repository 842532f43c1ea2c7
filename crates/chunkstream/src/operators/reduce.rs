//! `Reduce(initial, reducer)` — a synchronous fold over the stream,
//! returning the final accumulator when the source ends (spec §4.6).

use crate::reader::{Partial, Reader};
use chunkstream_core::Chunk;

/// Folds `reducer` over every chunk, including the terminal sentinel.
/// Stops early on a read error, returning the accumulator as of that point
/// alongside the error (same "partial plus error" contract as `collect`).
pub async fn reduce<T, F>(mut source: Reader, initial: T, mut reducer: F) -> Partial<T>
where
    F: FnMut(T, Chunk) -> T,
{
    let mut acc = initial;
    loop {
        match source.next().await {
            Ok(Some(chunk)) => acc = reducer(acc, chunk),
            Ok(None) => return Partial { value: acc, error: None },
            Err(error) => return Partial { value: acc, error: Some(error) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkstream_core::StreamOptions;

    #[tokio::test]
    async fn reduce_counts_non_terminal_chunks() {
        let (writer, reader) = crate::channel(StreamOptions::default());
        writer.write_text("a").await.unwrap();
        writer.write_text("b").await.unwrap();
        writer.write_text("c").await.unwrap();
        writer.close().await.unwrap();

        let partial = reduce(reader, 0usize, |count, chunk| {
            if chunk.is_last {
                count
            } else {
                count + 1
            }
        })
        .await;

        assert_eq!(partial.value, 3);
        assert!(partial.error.is_none());
    }
}
