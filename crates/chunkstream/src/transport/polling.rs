//! Polling transport (spec §4.9, §6): clients `GET /...?since=<n>` and
//! receive every chunk with a higher sequence number. Buffered history is
//! capped at 1000 entries, oldest evicted — the separate "polling ring" spec
//! §9 calls out from the per-consumer queue ring: both reuse
//! [`chunkstream_core::RingBuffer`], but the polling ring is always
//! oldest-wins on overflow (never newest-wins/drop, which is the
//! multiplexer's backpressure policy instead).

use crate::reader::Reader;
use chunkstream_core::{Chunk, RingBuffer};
use std::sync::Arc;

const POLLING_RING_CAPACITY: usize = 1000;

/// One page of polling results: the chunks with `sequence > since`, and the
/// highest sequence number the client should pass as `since` next time.
#[derive(Debug, Clone)]
pub struct PollingPage {
    pub chunks: Vec<Chunk>,
    pub last_sequence: u64,
}

/// Buffered chunk history for the polling transport. Thread-safe: the
/// underlying ring buffer holds a single mutex (spec §4.2).
pub struct PollingBuffer {
    ring: RingBuffer<Chunk>,
}

impl PollingBuffer {
    pub fn new() -> Self {
        Self {
            ring: RingBuffer::new(POLLING_RING_CAPACITY),
        }
    }

    pub fn push(&self, chunk: Chunk) {
        self.ring.push(chunk);
    }

    /// Every buffered chunk with `sequence > since`, oldest first.
    pub fn since(&self, since: u64) -> PollingPage {
        let chunks: Vec<Chunk> = self
            .ring
            .to_slice()
            .into_iter()
            .filter(|chunk| chunk.metadata.sequence > since)
            .collect();
        let last_sequence = chunks
            .last()
            .map_or(since, |chunk| chunk.metadata.sequence);
        PollingPage {
            chunks,
            last_sequence,
        }
    }

    /// Spawns a task draining `reader` into a shared [`PollingBuffer`],
    /// returning the buffer handles can poll while the task runs.
    pub fn spawn_from_reader(mut reader: Reader) -> Arc<Self> {
        let buffer = Arc::new(Self::new());
        let sink = Arc::clone(&buffer);
        tokio::spawn(async move {
            loop {
                match reader.next().await {
                    Ok(Some(chunk)) => {
                        let is_last = chunk.is_last;
                        sink.push(chunk);
                        if is_last {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        });
        buffer
    }
}

impl Default for PollingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
