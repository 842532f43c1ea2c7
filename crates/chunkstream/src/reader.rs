//! The consumer half of a chunk stream (spec §4.4).

use crate::shutdown::ShutdownSignal;
use crate::stats::{ReaderStats, StreamState};
use chunkstream_core::{Chunk, ChunkType, Component, RingBuffer, StreamError, StreamOptions};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn state_to_u8(state: StreamState) -> u8 {
    match state {
        StreamState::Running => 0,
        StreamState::Paused => 1,
        StreamState::Complete => 2,
        StreamState::Error => 3,
        StreamState::Closed => 4,
    }
}

fn state_from_u8(v: u8) -> StreamState {
    match v {
        1 => StreamState::Paused,
        2 => StreamState::Complete,
        3 => StreamState::Error,
        4 => StreamState::Closed,
        _ => StreamState::Running,
    }
}

struct ReaderCounters {
    chunks_read: u64,
    bytes_read: u64,
    error_count: u64,
    start_time: Instant,
    last_error: Option<String>,
    progress: Option<f64>,
}

impl ReaderCounters {
    fn new() -> Self {
        Self {
            chunks_read: 0,
            bytes_read: 0,
            error_count: 0,
            start_time: Instant::now(),
            last_error: None,
            progress: None,
        }
    }
}

/// Accumulated result from [`Reader::collect`]: partial data plus the error
/// that cut collection short, when there was one (spec §4.4: "Collect
/// helpers return both the accumulated partial result and the error").
#[derive(Debug)]
pub struct Partial<T> {
    pub value: T,
    pub error: Option<StreamError>,
}

/// The consumer half of a chunk stream.
pub struct Reader {
    receiver: mpsc::Receiver<Chunk>,
    ring: Option<RingBuffer<Chunk>>,
    closed: AtomicBool,
    state: AtomicU8,
    counters: Mutex<ReaderCounters>,
    chunk_timeout: Duration,
    retry_on_error: bool,
    max_retries: u32,
    retry_delay: Duration,
    max_collect_size: usize,
    shutdown: ShutdownSignal,
}

impl Reader {
    pub(crate) fn new(
        receiver: mpsc::Receiver<Chunk>,
        options: StreamOptions,
        shutdown: ShutdownSignal,
    ) -> Self {
        let ring = options
            .enable_buffer
            .then(|| RingBuffer::new(options.replay_buffer_size));
        Self {
            receiver,
            ring,
            closed: AtomicBool::new(false),
            state: AtomicU8::new(state_to_u8(StreamState::Running)),
            counters: Mutex::new(ReaderCounters::new()),
            chunk_timeout: options.chunk_timeout,
            retry_on_error: options.retry_on_error,
            max_retries: options.max_retries,
            retry_delay: options.retry_delay,
            max_collect_size: options.max_collect_size,
            shutdown,
        }
    }

    fn state(&self) -> StreamState {
        state_from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state_to_u8(state), Ordering::Release);
    }

    fn record_progress(&self, chunk: &Chunk) {
        let mut counters = self.counters.lock().unwrap();
        if let Some(p) = chunk.metadata.progress {
            counters.progress = Some(p);
        } else if let (Some(current), Some(total)) =
            (chunk.metadata.current, chunk.metadata.total)
        {
            if total > 0 {
                counters.progress = Some(current as f64 / total as f64 * 100.0);
            }
        }
    }

    fn record_read(&self, chunk: &Chunk) {
        let bytes = chunk.approx_size() as u64;
        self.record_progress(chunk);
        let mut counters = self.counters.lock().unwrap();
        counters.chunks_read += 1;
        counters.bytes_read += bytes;
    }

    fn record_error(&self, message: &str) {
        let mut counters = self.counters.lock().unwrap();
        counters.error_count += 1;
        counters.last_error = Some(message.to_string());
    }

    /// Reverses the accounting `record_read` did for a chunk that `next()`
    /// already returned but the caller is about to exclude from its result
    /// (spec §8 scenario 6: "chunksRead equals length of returned slice").
    fn undo_read(&self, chunk: &Chunk) {
        let bytes = chunk.approx_size() as u64;
        let mut counters = self.counters.lock().unwrap();
        counters.chunks_read = counters.chunks_read.saturating_sub(1);
        counters.bytes_read = counters.bytes_read.saturating_sub(bytes);
    }

    /// Returns the next chunk, or `Ok(None)` at end-of-stream (spec §4.4).
    pub async fn next(&mut self) -> Result<Option<Chunk>, StreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }

        let mut retries = 0u32;
        loop {
            if let Some(ring) = &self.ring {
                if let Some(chunk) = ring.pop() {
                    self.record_read(&chunk);
                    return Ok(Some(chunk));
                }
            }

            let received = if self.chunk_timeout.is_zero() {
                tokio::select! {
                    chunk = self.receiver.recv() => Ok(chunk),
                    () = self.shutdown.cancelled() => Err(StreamError::Cancelled {
                        component: Component::Reader,
                        operation: "next",
                    }),
                }
            } else {
                let started = Instant::now();
                tokio::select! {
                    result = tokio::time::timeout(self.chunk_timeout, self.receiver.recv()) => {
                        match result {
                            Ok(chunk) => Ok(chunk),
                            Err(_) => {
                                self.set_state(StreamState::Error);
                                self.record_error("chunk_timeout elapsed");
                                Err(StreamError::Timeout {
                                    component: Component::Reader,
                                    operation: "next",
                                    elapsed_ms: started.elapsed().as_millis() as u64,
                                })
                            }
                        }
                    }
                    () = self.shutdown.cancelled() => Err(StreamError::Cancelled {
                        component: Component::Reader,
                        operation: "next",
                    }),
                }
            };

            let chunk = match received {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    self.closed.store(true, Ordering::Release);
                    self.set_state(StreamState::Closed);
                    return Ok(None);
                }
                Err(err @ StreamError::Cancelled { .. }) => {
                    self.closed.store(true, Ordering::Release);
                    self.set_state(StreamState::Closed);
                    return Err(err);
                }
                Err(err) => return Err(err),
            };

            if chunk.is_last {
                self.set_state(StreamState::Complete);
                self.record_read(&chunk);
                return Ok(Some(chunk));
            }

            if chunk.chunk_type == ChunkType::Error {
                let message = chunk
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                self.set_state(StreamState::Error);
                self.record_error(&message);

                if self.retry_on_error && retries < self.max_retries {
                    retries += 1;
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }

                return Err(StreamError::External {
                    component: Component::Reader,
                    source_message: message,
                });
            }

            self.record_read(&chunk);
            return Ok(Some(chunk));
        }
    }

    /// Drains to end-of-stream, enforcing `max_collect_size` across the
    /// whole call (spec §4.4).
    pub async fn collect(&mut self) -> Partial<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut total = 0usize;

        loop {
            match self.next().await {
                Ok(Some(chunk)) => {
                    let size = chunk.approx_size();
                    if total + size > self.max_collect_size {
                        self.undo_read(&chunk);
                        return Partial {
                            value: chunks,
                            error: Some(StreamError::SizeLimitExceeded {
                                component: Component::Reader,
                                collected: total,
                                limit: self.max_collect_size,
                            }),
                        };
                    }
                    total += size;
                    chunks.push(chunk);
                }
                Ok(None) => return Partial { value: chunks, error: None },
                Err(error) => return Partial { value: chunks, error: Some(error) },
            }
        }
    }

    /// Same as [`Reader::collect`] but accumulates only `Text`-typed
    /// chunks' text into a single string (spec §4.4).
    pub async fn collect_text(&mut self) -> Partial<String> {
        const PER_CHUNK_OVERHEAD: usize = 256;
        let mut text = String::new();
        let mut total = 0usize;

        loop {
            match self.next().await {
                Ok(Some(chunk)) => {
                    if chunk.chunk_type == ChunkType::Text {
                        if let Some(piece) = &chunk.text {
                            let size = piece.len() + PER_CHUNK_OVERHEAD;
                            if total + size > self.max_collect_size {
                                self.undo_read(&chunk);
                                return Partial {
                                    value: text,
                                    error: Some(StreamError::SizeLimitExceeded {
                                        component: Component::Reader,
                                        collected: total,
                                        limit: self.max_collect_size,
                                    }),
                                };
                            }
                            total += size;
                            text.push_str(piece);
                        }
                    }
                }
                Ok(None) => return Partial { value: text, error: None },
                Err(error) => return Partial { value: text, error: Some(error) },
            }
        }
    }

    /// Consumes remaining chunks, discarding them.
    pub async fn drain(&mut self) -> Result<(), StreamError> {
        loop {
            match self.next().await {
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(()),
                Err(error) if error.is_terminal() => return Err(error),
                Err(_) => continue,
            }
        }
    }

    /// Advisory: marks the reader `Paused` for observers. Data still flows
    /// if the producer keeps writing (spec §4.4).
    pub fn pause(&self) {
        if self.state() == StreamState::Running {
            self.set_state(StreamState::Paused);
        }
    }

    pub fn resume(&self) {
        if self.state() == StreamState::Paused {
            self.set_state(StreamState::Running);
        }
    }

    /// Closes the reader. Idempotent: the first call drains the ring
    /// buffer, cancels the shutdown signal, and transitions to `Closed`
    /// (spec §4.4).
    pub fn cancel(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(ring) = &self.ring {
            ring.clear();
        }
        self.set_state(StreamState::Closed);
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ReaderStats {
        let counters = self.counters.lock().unwrap();
        ReaderStats {
            state: self.state(),
            chunks_read: counters.chunks_read,
            bytes_read: counters.bytes_read,
            error_count: counters.error_count,
            elapsed: counters.start_time.elapsed(),
            last_error: counters.last_error.clone(),
            progress: counters.progress,
        }
    }

    /// Adapts this reader into a [`futures_core::Stream`] of chunks,
    /// ending at end-of-stream or on the first error.
    pub fn into_stream(self) -> impl futures_core::Stream<Item = Chunk> {
        futures_util::stream::unfold(self, |mut reader| async move {
            match reader.next().await {
                Ok(Some(chunk)) => Some((chunk, reader)),
                _ => None,
            }
        })
    }
}
