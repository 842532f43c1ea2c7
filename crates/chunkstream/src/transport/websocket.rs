//! WebSocket framing (spec §4.9, §6): one text message per chunk (JSON),
//! except `Binary`-typed chunks which go out as binary messages. The
//! symmetric read path decodes messages back into chunks. The bidirectional
//! variant exposes an input channel and an output channel bound to the same
//! socket, with read/write worker tasks sharing one cancellation signal —
//! the same task-pair-plus-shared-cancellation shape
//! `teacher-span_collector::async_bridge::AsyncSpanCollector` uses for its
//! consumer task and shutdown handshake.

use crate::shutdown::ShutdownSignal;
use axum::extract::ws::{Message, WebSocket};
use chunkstream_core::{Chunk, ChunkType, Metadata};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

/// Encodes a chunk as the `Message` spec §4.9/§6 call for: `Binary`-typed
/// chunks become a binary message carrying the chunk's payload bytes;
/// everything else becomes a text message carrying the JSON chunk.
pub fn encode_chunk(chunk: &Chunk) -> Message {
    if chunk.chunk_type == ChunkType::Binary {
        if let Some(bytes) = chunk
            .data
            .as_ref()
            .and_then(|v| serde_json::from_value::<Vec<u8>>(v.clone()).ok())
        {
            return Message::Binary(bytes);
        }
    }
    Message::Text(serde_json::to_string(chunk).unwrap_or_default())
}

/// Decodes a `Message` back into a `Chunk` (spec §4.9: "Symmetric read path
/// decodes messages back into chunks").
pub fn decode_message(message: Message) -> Option<Chunk> {
    match message {
        Message::Text(text) => serde_json::from_str(&text).ok(),
        Message::Binary(bytes) => {
            let mut chunk = Chunk::new(ChunkType::Binary);
            chunk.data = Some(serde_json::to_value(bytes).unwrap_or_default());
            chunk.metadata = Metadata::default();
            Some(chunk)
        }
        Message::Close(_) | Message::Ping(_) | Message::Pong(_) => None,
    }
}

/// A bidirectional framing wrapper over one `WebSocket`: an input channel of
/// decoded chunks and an output channel of chunks to send, bound to the same
/// socket by independent read/write worker tasks under a shared cancellation
/// signal (spec §4.9: "Bidirectional variant exposes an input channel and an
/// output channel bound to the same socket, with read/write worker tasks and
/// a shared cancellation").
pub struct BidiSocket {
    pub inbound: mpsc::Receiver<Chunk>,
    pub outbound: mpsc::Sender<Chunk>,
    shutdown: ShutdownSignal,
}

impl BidiSocket {
    /// Spawns the read and write worker tasks and returns the channel pair.
    /// `buffer_size` sizes both directions (spec §3: `bufferSize`).
    pub fn spawn(socket: WebSocket, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        let (mut sink, mut stream) = socket.split();
        let (in_tx, in_rx) = mpsc::channel(buffer_size);
        let (out_tx, mut out_rx) = mpsc::channel::<Chunk>(buffer_size);
        let shutdown = ShutdownSignal::new();

        let reader_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = stream.next() => {
                        match message {
                            Some(Ok(message)) => {
                                if let Some(chunk) = decode_message(message) {
                                    if in_tx.send(chunk).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            _ => break,
                        }
                    }
                    () = reader_shutdown.cancelled() => break,
                }
            }
        });

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    chunk = out_rx.recv() => {
                        match chunk {
                            Some(chunk) => {
                                if sink.send(encode_chunk(&chunk)).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    () = writer_shutdown.cancelled() => break,
                }
            }
            let _ = sink.close().await;
        });

        Self {
            inbound: in_rx,
            outbound: out_tx,
            shutdown,
        }
    }

    /// Cancels both worker tasks.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}
