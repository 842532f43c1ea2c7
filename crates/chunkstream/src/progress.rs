//! Progress Tracker: ETA calculation and progress-chunk emission from a
//! counter (spec §4.8).
//!
//! The counter itself is a plain `AtomicU64`, the same "thread-safe via
//! atomic counter" shape `span_collector::ExportMetrics` uses for its
//! concurrently-incremented fields; emission reuses [`crate::writer::Writer`]
//! rather than building a second sending path.

use crate::writer::Writer;
use chunkstream_core::StreamError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Reports progress against a known `total` by emitting `Progress` chunks
/// through a [`Writer`] (spec §4.8).
pub struct ProgressTracker<'w> {
    writer: &'w Writer,
    total: u64,
    current: AtomicU64,
    started: Instant,
}

impl<'w> ProgressTracker<'w> {
    pub fn new(writer: &'w Writer, total: u64) -> Self {
        Self {
            writer,
            total,
            current: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Advances the counter by `delta` and reports (spec §4.8: `Increment`).
    pub async fn increment(&self, delta: u64) -> Result<(), StreamError> {
        let current = self.current.fetch_add(delta, Ordering::AcqRel) + delta;
        self.report(current).await
    }

    /// Sets the counter to `current` and emits a `Progress` chunk with the
    /// computed percentage and ETA (spec §4.8: `Report`).
    ///
    /// ETA = `elapsed * remaining / current`; undefined (omitted) when
    /// `current == 0`.
    pub async fn report(&self, current: u64) -> Result<(), StreamError> {
        self.current.store(current, Ordering::Release);
        let total = self.total.max(1);
        let progress = (current as f64 / total as f64 * 100.0).clamp(0.0, 100.0);

        let eta_ms = if current == 0 || current >= total {
            None
        } else {
            let elapsed_ms = self.started.elapsed().as_millis() as u64;
            let remaining = total - current;
            Some(elapsed_ms.saturating_mul(remaining) / current)
        };

        let mut chunk = chunkstream_core::Chunk::progress(progress, None);
        chunk.metadata.current = Some(current);
        chunk.metadata.total = Some(self.total);
        chunk.metadata.eta = eta_ms;
        self.writer.write_chunk(chunk).await
    }

    /// Forces a 100% report regardless of the current counter value
    /// (spec §4.8: `Complete`).
    pub async fn complete(&self) -> Result<(), StreamError> {
        self.current.store(self.total, Ordering::Release);
        self.report(self.total).await
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
