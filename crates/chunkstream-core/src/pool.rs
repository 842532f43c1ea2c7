//! Reusable `Chunk` allocator with reset-on-release (spec §4.1).
//!
//! Pooling is an allocation optimization, not a semantic contract (spec
//! §9): callers that retain a chunk past the current handler iteration
//! must clone it first. The pool itself follows the same
//! `Mutex<Vec<_>>`-backed free-list shape the teacher uses for shared
//! mutable state off the hot path (e.g. `TestExporter`'s
//! `Mutex<Vec<Span>>` in `span_collector::exporter`), since a pool's
//! checkout/checkin pair is exactly that kind of occasional, short
//! critical section rather than a per-message hot path.

use crate::chunk::{Chunk, ChunkType};
use std::sync::Mutex;

/// A pool of reusable [`Chunk`] instances.
///
/// `acquire` hands out a chunk of the requested type, either freshly
/// allocated or recycled from a previous `release`. `release` resets
/// every field (spec §4.1: "release resets every field and returns the
/// instance for reuse") and returns the instance to the free list.
/// Sequence numbers are never touched here — only the `Writer` assigns
/// them.
pub struct ObjectPool {
    free: Mutex<Vec<Chunk>>,
    max_idle: usize,
}

impl ObjectPool {
    /// `max_idle` bounds how many released chunks the pool keeps around;
    /// beyond that, `release` simply drops the instance instead of
    /// growing the free list without limit.
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle.min(64))),
            max_idle,
        }
    }

    pub fn acquire(&self, chunk_type: ChunkType) -> Chunk {
        let mut chunk = match self.free.lock().unwrap().pop() {
            Some(chunk) => chunk,
            None => Chunk::new(chunk_type),
        };
        chunk.reset(chunk_type);
        chunk
    }

    pub fn release(&self, mut chunk: Chunk) {
        chunk.reset(ChunkType::Control);
        let mut free = self.free.lock().unwrap();
        if free.len() < self.max_idle {
            free.push(chunk);
        }
    }

    /// Number of chunks currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new(256)
    }
}
