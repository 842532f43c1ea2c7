//! Free-function forms of `Collect`/`CollectText`, exposed as first-class
//! operators alongside `map`/`filter`/etc. (spec §4.6 note: these are the
//! same bounded-memory helpers as `Reader::collect`/`Reader::collect_text`,
//! offered as functions so pipelines built entirely from `operators::*`
//! calls don't need to reach back into the `Reader` API directly).

use crate::reader::{Partial, Reader};

pub async fn collect(mut source: Reader) -> Partial<Vec<chunkstream_core::Chunk>> {
    source.collect().await
}

pub async fn collect_text(mut source: Reader) -> Partial<String> {
    source.collect_text().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkstream_core::StreamOptions;

    #[tokio::test]
    async fn collect_text_wraps_reader_collect_text() {
        let (writer, reader) = crate::channel(StreamOptions::default());
        writer.write_text("hi").await.unwrap();
        writer.close().await.unwrap();

        let partial = collect_text(reader).await;
        assert_eq!(partial.value, "hi");
    }
}
