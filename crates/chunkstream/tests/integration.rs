//! End-to-end scenarios spanning Writer, Reader, operators, Multiplexer and
//! ProgressTracker together, in the same flat style
//! `teacher-ringmpsc-stream::tests::integration` uses for its own
//! producer/consumer scenarios.

use chunkstream::{channel, operators, ConsumerCallbacks, Multiplexer, ProgressTracker, StreamError, StreamOptions};
use chunkstream_core::Chunk;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scenario 1: a producer writes a few text chunks, a reader collects them
/// into one string, and the terminal control chunk is visible via `next()`
/// but excluded from `collect_text`.
#[tokio::test]
async fn simple_text_stream_collects_in_order() {
    let (writer, mut reader) = channel(StreamOptions::default());

    let producer = tokio::spawn(async move {
        writer.write_text("hello, ").await.unwrap();
        writer.write_text("world").await.unwrap();
        writer.close().await.unwrap();
    });

    let partial = reader.collect_text().await;
    producer.await.unwrap();

    assert_eq!(partial.value, "hello, world");
    assert!(partial.error.is_none());
}

/// Scenario 2: a producer reports progress through a `ProgressTracker` while
/// a consumer reads; progress and ETA metadata should be monotonically
/// non-decreasing and the final chunk should read 100%.
#[tokio::test]
async fn progress_tracked_pipeline_reports_monotonic_progress() {
    let (writer, mut reader) = channel(StreamOptions::default());
    let total = 4u64;

    let producer = tokio::spawn(async move {
        let tracker = ProgressTracker::new(&writer, total);
        for _ in 0..total {
            tokio::time::sleep(Duration::from_millis(2)).await;
            tracker.increment(1).await.unwrap();
        }
        tracker.complete().await.unwrap();
        writer.close().await.unwrap();
    });

    let mut seen_progress = Vec::new();
    loop {
        match reader.next().await.unwrap() {
            Some(chunk) if chunk.is_last => break,
            Some(chunk) => {
                if let Some(progress) = chunk.metadata.progress {
                    seen_progress.push(progress);
                }
            }
            None => break,
        }
    }
    producer.await.unwrap();

    assert!(!seen_progress.is_empty());
    for window in seen_progress.windows(2) {
        assert!(window[1] >= window[0]);
    }
    assert_eq!(*seen_progress.last().unwrap(), 100.0);
}

/// Scenario 3: cancelling the reader mid-stream promptly surfaces
/// `StreamError::Cancelled` instead of hanging, and no further chunks are
/// delivered afterward.
#[tokio::test]
async fn cancel_mid_stream_stops_promptly() {
    let (writer, mut reader) = channel(StreamOptions::default());

    let stop = Arc::new(AtomicBool::new(false));
    let producer_stop = Arc::clone(&stop);
    let producer = tokio::spawn(async move {
        let mut i = 0u64;
        while !producer_stop.load(Ordering::Relaxed) {
            if writer.write_text(format!("chunk-{i}")).await.is_err() {
                break;
            }
            i += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    // Let a few chunks flow, then cancel from another task while a `next()`
    // call may be in flight.
    for _ in 0..3 {
        reader.next().await.unwrap();
    }
    reader.cancel();
    stop.store(true, Ordering::Relaxed);

    let result = tokio::time::timeout(Duration::from_secs(1), reader.next()).await;
    match result {
        Ok(Ok(None)) => {}
        Ok(Err(StreamError::Cancelled { .. })) => {}
        other => panic!("expected prompt cancellation or end-of-stream, got {other:?}"),
    }

    let _ = producer.await;
}

struct CountingConsumer {
    name: &'static str,
    chunks: Mutex<Vec<Chunk>>,
    completed: AtomicBool,
}

impl CountingConsumer {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            chunks: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
        }
    }
}

impl ConsumerCallbacks for CountingConsumer {
    async fn on_start(&self) -> Result<(), StreamError> {
        Ok(())
    }

    async fn on_chunk(&self, chunk: Chunk) {
        self.chunks.lock().unwrap().push(chunk);
    }

    async fn on_error(&self, _err: StreamError) {}

    async fn on_complete(&self) {
        self.completed.store(true, Ordering::Relaxed);
        let _ = self.name;
    }
}

/// Scenario 4: every registered consumer of a `Multiplexer` sees every chunk,
/// in order, and is notified of completion.
#[tokio::test]
async fn fan_out_broadcast_reaches_every_consumer() {
    let mux = Multiplexer::new(StreamOptions::default());
    let a = Arc::new(CountingConsumer::new("a"));
    let b = Arc::new(CountingConsumer::new("b"));
    mux.add_consumer(a.clone()).await.unwrap();
    mux.add_consumer(b.clone()).await.unwrap();

    let (writer, reader) = channel(StreamOptions::default());
    mux.start(reader).await.unwrap();

    for i in 0..10 {
        writer.write_text(format!("{i}")).await.unwrap();
    }
    writer.close().await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    mux.close().await.unwrap();

    let a_chunks = a.chunks.lock().unwrap();
    let b_chunks = b.chunks.lock().unwrap();
    assert_eq!(a_chunks.len(), 11);
    assert_eq!(b_chunks.len(), 11);
    for (x, y) in a_chunks.iter().zip(b_chunks.iter()) {
        assert_eq!(x.metadata.sequence, y.metadata.sequence);
    }
    assert!(a.completed.load(Ordering::Relaxed));
    assert!(b.completed.load(Ordering::Relaxed));
}

struct SlowConsumer {
    delay: Duration,
    received: std::sync::atomic::AtomicUsize,
}

impl ConsumerCallbacks for SlowConsumer {
    async fn on_start(&self) -> Result<(), StreamError> {
        Ok(())
    }

    async fn on_chunk(&self, _chunk: Chunk) {
        tokio::time::sleep(self.delay).await;
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    async fn on_error(&self, _err: StreamError) {}

    async fn on_complete(&self) {}
}

/// Scenario 5: with backpressure enabled, a slow consumer on a tiny queue
/// falls behind and drops chunks, but never blocks a fast consumer or the
/// source from finishing quickly.
#[tokio::test]
async fn backpressure_drops_for_a_slow_consumer() {
    let options = StreamOptions::default()
        .with_buffer_size(500)
        .with_enable_backpressure(true);
    let mux = Multiplexer::new(options.clone());

    let fast = Arc::new(CountingConsumer::new("fast"));
    let slow = Arc::new(SlowConsumer {
        delay: Duration::from_millis(10),
        received: std::sync::atomic::AtomicUsize::new(0),
    });
    mux.add_consumer(fast.clone()).await.unwrap();
    mux.add_consumer_with_buffer(slow.clone(), 4).await.unwrap();

    let (writer, reader) = channel(options);
    let start = std::time::Instant::now();
    mux.start(reader).await.unwrap();

    for i in 0..100 {
        writer.write_text(format!("{i}")).await.unwrap();
    }
    writer.close().await.unwrap();

    // The source finishes quickly regardless of the slow consumer.
    assert!(start.elapsed() < Duration::from_millis(200));

    tokio::time::sleep(Duration::from_millis(100)).await;
    mux.close().await.unwrap();

    assert_eq!(fast.chunks.lock().unwrap().len(), 101);
    assert!(slow.received.load(Ordering::Relaxed) < 101);
    assert!(mux.stats().total_errors > 0);
}

/// Scenario 6: `collect` stops as soon as the accumulated size would exceed
/// `max_collect_size`, returning both the partial data and the error.
#[tokio::test]
async fn collect_stops_at_the_configured_size_limit() {
    let options = StreamOptions::default().with_max_collect_size(1024);
    let (writer, mut reader) = channel(options);

    tokio::spawn(async move {
        for _ in 0..50 {
            if writer.write_text(&"x".repeat(50)).await.is_err() {
                break;
            }
        }
        let _ = writer.close().await;
    });

    let partial = reader.collect().await;
    assert!(partial.error.is_some());
    assert!(matches!(
        partial.error,
        Some(StreamError::SizeLimitExceeded { .. })
    ));
    let total: usize = partial.value.iter().map(Chunk::approx_size).sum();
    assert!(total <= 1024);
}

/// An operator pipeline (filter -> map -> batch) composes end to end.
#[tokio::test]
async fn operator_pipeline_filters_maps_and_batches() {
    let (writer, reader) = channel(StreamOptions::default());
    let filtered = operators::filter(reader, StreamOptions::default(), |chunk| {
        chunk.text.as_deref().map(|t| t.len() > 1).unwrap_or(true)
    });
    let mapped = operators::map(filtered, StreamOptions::default(), |mut chunk| {
        if let Some(text) = &mut chunk.text {
            *text = text.to_uppercase();
        }
        Ok(chunk)
    });
    let mut batched = operators::batch(mapped, StreamOptions::default(), 2, Duration::from_millis(50));

    for word in ["a", "hi", "there", "friend"] {
        writer.write_text(word).await.unwrap();
    }
    writer.close().await.unwrap();

    let partial = batched.collect().await;
    assert!(partial.error.is_none());
    // "a" is filtered out (len <= 1); "hi"/"there" form one batch, "friend"
    // plus the terminal control chunk trails in a final batch or alone.
    assert!(!partial.value.is_empty());
}
