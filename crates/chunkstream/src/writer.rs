//! The producer half of a chunk stream (spec §4.3).
//!
//! Grounded on the `send`/backpressure shape of `ringmpsc-stream::RingSender`,
//! but backed by a plain `tokio::sync::mpsc::Sender<Chunk>` rather than the
//! teacher's lock-free ring: a Writer has exactly one owner and the spec's
//! concurrency model (§5) asks for a mutex around the stats record and
//! atomics on the hot path, not per-slot atomics on the channel itself.

use crate::shutdown::ShutdownSignal;
use chunkstream_core::{Chunk, ChunkType, Component, Metadata, StreamError, StreamOptions};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

use crate::stats::WriterStats;

/// A pure function applied to every outbound chunk before it is sent
/// (spec §3: `enableTransform` + `transformFunc`).
pub type Transform = std::sync::Arc<dyn Fn(Chunk) -> Result<Chunk, String> + Send + Sync>;

/// The producer half of a chunk stream.
///
/// Exclusively owns the sending end of its channel (spec §3: "Writer
/// exclusively owns its channel; closes it exactly once"). Cloning a
/// `Writer` is intentionally not supported; wrap it in an `Arc` if multiple
/// tasks must share one (the pool's per-operator Writer is always
/// single-owner).
pub struct Writer {
    sender: RwLock<Option<mpsc::Sender<Chunk>>>,
    sequence: AtomicU64,
    closed: AtomicBool,
    stats: Mutex<WriterStats>,
    chunk_timeout: Duration,
    transform: Option<Transform>,
    shutdown: ShutdownSignal,
}

impl Writer {
    pub(crate) fn new(
        sender: mpsc::Sender<Chunk>,
        options: &StreamOptions,
        transform: Option<Transform>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            sender: RwLock::new(Some(sender)),
            sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            stats: Mutex::new(WriterStats::new()),
            chunk_timeout: options.chunk_timeout,
            transform,
            shutdown,
        }
    }

    /// Applies the configured transform (if any), assigns sequence and
    /// timestamp, and sends on the channel (spec §4.3).
    ///
    /// Sequence is assigned only once the transform has succeeded, and is
    /// rolled back if the send itself fails (closed/timeout/cancelled): a
    /// chunk that is never emitted must never consume a sequence number, or
    /// the run the `Reader` observes stops being the "strictly increasing
    /// consecutive run starting at 1" spec §3/§8 requires.
    pub async fn write_chunk(&self, mut chunk: Chunk) -> Result<(), StreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::WriteClosed {
                component: Component::Writer,
            });
        }

        if let Some(transform) = &self.transform {
            chunk = transform(chunk).map_err(|reason| {
                self.record_error();
                StreamError::Transform {
                    component: Component::Writer,
                    reason,
                }
            })?;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        chunk.metadata.sequence = sequence;
        chunk.metadata.timestamp = Metadata::now_millis();

        let approx_size = chunk.approx_size() as u64;
        if let Err(err) = self.send(chunk).await {
            self.sequence.fetch_sub(1, Ordering::AcqRel);
            return Err(err);
        }
        self.record_write(approx_size);
        Ok(())
    }

    async fn send(&self, chunk: Chunk) -> Result<(), StreamError> {
        let guard = self.sender.read().await;
        let sender = guard.as_ref().ok_or(StreamError::WriteClosed {
            component: Component::Writer,
        })?;

        if self.chunk_timeout.is_zero() {
            tokio::select! {
                result = sender.send(chunk) => result.map_err(|_| StreamError::WriteClosed {
                    component: Component::Writer,
                }),
                () = self.shutdown.cancelled() => Err(StreamError::Cancelled {
                    component: Component::Writer,
                    operation: "write_chunk",
                }),
            }
        } else {
            let started = Instant::now();
            tokio::select! {
                result = tokio::time::timeout(self.chunk_timeout, sender.send(chunk)) => {
                    match result {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(_)) => Err(StreamError::WriteClosed {
                            component: Component::Writer,
                        }),
                        Err(_) => {
                            self.record_error();
                            Err(StreamError::Timeout {
                                component: Component::Writer,
                                operation: "write_chunk",
                                elapsed_ms: started.elapsed().as_millis() as u64,
                            })
                        }
                    }
                }
                () = self.shutdown.cancelled() => Err(StreamError::Cancelled {
                    component: Component::Writer,
                    operation: "write_chunk",
                }),
            }
        }
    }

    fn record_write(&self, bytes: u64) {
        let mut stats = self.stats.lock().unwrap();
        stats.chunks_written += 1;
        stats.bytes_written += bytes;
        stats.last_write = Some(Instant::now());
    }

    fn record_error(&self) {
        self.stats.lock().unwrap().error_count += 1;
    }

    /// `Write(bytes)` — raw bytes carried as a Text chunk (spec §4.3).
    pub async fn write(&self, bytes: &[u8]) -> Result<(), StreamError> {
        self.write_text(&String::from_utf8_lossy(bytes)).await
    }

    pub async fn write_text(&self, text: &str) -> Result<(), StreamError> {
        self.write_chunk(Chunk::text(text)).await
    }

    pub async fn write_json(&self, data: Value) -> Result<(), StreamError> {
        self.write_chunk(Chunk::json(data)).await
    }

    pub async fn write_progress(
        &self,
        progress: f64,
        message: Option<String>,
    ) -> Result<(), StreamError> {
        self.write_chunk(Chunk::progress(progress, message)).await
    }

    pub async fn write_status(&self, status: &str) -> Result<(), StreamError> {
        self.write_chunk(Chunk::status(status)).await
    }

    pub async fn write_error(&self, err: impl std::fmt::Display) -> Result<(), StreamError> {
        self.record_error();
        self.write_chunk(Chunk::error(err)).await
    }

    /// Writes every chunk in order, short-circuiting on the first failure
    /// (spec §4.3: `WriteBatch`).
    pub async fn write_batch(&self, chunks: Vec<Chunk>) -> Result<(), StreamError> {
        for chunk in chunks {
            self.write_chunk(chunk).await?;
        }
        Ok(())
    }

    /// Idempotent: the first call emits a terminal `Control` chunk
    /// (best-effort, 1s send deadline) then closes the channel. Subsequent
    /// calls fail with `WriteClosed` (spec §4.3).
    ///
    /// Does not fire `self.shutdown`: that signal is shared with the paired
    /// `Reader` (spec §5's reader-cancels-writer direction only —
    /// `Reader::cancel` fires it so an in-flight `send` wakes promptly). A
    /// normal close already ends the stream via channel closure (the
    /// terminal chunk, then a dropped sender), so firing the shared signal
    /// here would race `Reader::next`'s own `tokio::select!` between the
    /// still-buffered chunks and cancellation and could spuriously surface
    /// `Cancelled` instead of draining them.
    pub async fn close(&self) -> Result<(), StreamError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StreamError::WriteClosed {
                component: Component::Writer,
            });
        }

        {
            let guard = self.sender.read().await;
            if let Some(sender) = guard.as_ref() {
                let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
                let mut terminal = Chunk::terminal();
                terminal.metadata.sequence = sequence;
                terminal.metadata.timestamp = Metadata::now_millis();
                let _ = tokio::time::timeout(Duration::from_secs(1), sender.send(terminal)).await;
            }
        }

        *self.sender.write().await = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> WriterStats {
        self.stats.lock().unwrap().clone()
    }

    pub(crate) fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}

/// Allocates a chunk of the requested type, used by call sites that don't
/// route through [`chunkstream_core::ObjectPool`] directly.
pub fn new_chunk(chunk_type: ChunkType) -> Chunk {
    Chunk::new(chunk_type)
}
