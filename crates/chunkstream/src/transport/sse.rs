//! SSE framing (spec §4.9, §6): `event: <type>\ndata: <JSON(chunk)>\n\n`,
//! bracketed by a `start` and a `close` framing event.

use crate::reader::Reader;
use axum::response::sse::{Event, Sse};
use chunkstream_core::ChunkType;
use futures_core::Stream;
use std::convert::Infallible;

fn event_name(chunk_type: ChunkType) -> &'static str {
    match chunk_type {
        ChunkType::Text => "text",
        ChunkType::Binary => "binary",
        ChunkType::Json => "json",
        ChunkType::Progress => "progress",
        ChunkType::Status => "status",
        ChunkType::Error => "error",
        ChunkType::Control => "control",
    }
}

enum Framing {
    Start,
    Body,
    Close,
    Done,
}

/// Adapts `reader` into an SSE response body. The HTTP response writer must
/// support flush; `axum`'s `Sse` handles that per the framework's own
/// streaming body (spec §4.9: "Requires the HTTP response writer to support
/// flush").
pub fn sse_stream(reader: Reader) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let state = (reader, Framing::Start);
    let stream = futures_util::stream::unfold(state, |(mut reader, framing)| async move {
        match framing {
            Framing::Start => {
                let event = Event::default().event("start").data("{}");
                Some((Ok(event), (reader, Framing::Body)))
            }
            Framing::Body => match reader.next().await {
                Ok(Some(chunk)) => {
                    let payload = serde_json::to_string(&chunk).unwrap_or_default();
                    let event = Event::default().event(event_name(chunk.chunk_type)).data(payload);
                    let next_framing = if chunk.is_last {
                        Framing::Close
                    } else {
                        Framing::Body
                    };
                    Some((Ok(event), (reader, next_framing)))
                }
                Ok(None) | Err(_) => {
                    let event = Event::default().event("close").data("{}");
                    Some((Ok(event), (reader, Framing::Done)))
                }
            },
            Framing::Close => {
                let event = Event::default().event("close").data("{}");
                Some((Ok(event), (reader, Framing::Done)))
            }
            Framing::Done => None,
        }
    });

    Sse::new(stream)
}
