//! Chunked-HTTP framing (spec §4.9, §6): one JSON-encoded chunk per line,
//! flushed after each — newline-delimited JSON over an `axum` streaming body.

use crate::reader::Reader;
use axum::body::{Body, Bytes};

/// Adapts `reader` into a streaming `axum::body::Body` that yields one
/// `<JSON(chunk)>\n` line per item. Each item is its own frame on the
/// underlying `http_body::Body`, so there is no separate "flush" call: the
/// body implementation hands each line to the connection as it is produced.
pub fn chunked_http_body(reader: Reader) -> Body {
    let stream = futures_util::stream::unfold(reader, |mut reader| async move {
        match reader.next().await {
            Ok(Some(chunk)) => {
                let mut line = serde_json::to_vec(&chunk).unwrap_or_default();
                line.push(b'\n');
                Some((Ok::<_, std::io::Error>(Bytes::from(line)), reader))
            }
            Ok(None) | Err(_) => None,
        }
    });
    Body::from_stream(stream)
}
