//! One-to-many fan-out broadcaster (spec §4.5).
//!
//! The consumer capability set mirrors the teacher's native-async-fn
//! `SpanExporter`/`SpanExporterBoxed` split (`exporter.rs`): a
//! `ConsumerCallbacks` trait using `impl Future` for ergonomic
//! implementations, plus an object-safe `ConsumerCallbacksBoxed` with a
//! blanket impl so the multiplexer can hold `Arc<dyn ConsumerCallbacksBoxed>`.
//! `Close`'s task-join barrier is grounded on `async_bridge::AsyncSpanCollector`,
//! which tracks every spawned export task and waits for all of them before
//! returning from `shutdown()`.

use crate::reader::Reader;
use crate::shutdown::ShutdownSignal;
use chunkstream_core::{Chunk, Component, StreamError, StreamOptions};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// The capability set a multiplexer consumer must implement.
///
/// `on_error` and `on_complete` are invoked asynchronously and may run
/// concurrently with `on_chunk` deliveries (spec §4.5): implementations
/// must tolerate that.
pub trait ConsumerCallbacks: Send + Sync {
    fn on_start(&self) -> impl Future<Output = Result<(), StreamError>> + Send;
    fn on_chunk(&self, chunk: Chunk) -> impl Future<Output = ()> + Send;
    fn on_error(&self, err: StreamError) -> impl Future<Output = ()> + Send;
    fn on_complete(&self) -> impl Future<Output = ()> + Send;
}

/// Object-safe version of [`ConsumerCallbacks`] for storage behind `Arc<dyn _>`.
pub trait ConsumerCallbacksBoxed: Send + Sync {
    fn on_start_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>>;
    fn on_chunk_boxed(&self, chunk: Chunk) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
    fn on_error_boxed(&self, err: StreamError) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
    fn on_complete_boxed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl<T: ConsumerCallbacks> ConsumerCallbacksBoxed for T {
    fn on_start_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>> {
        Box::pin(self.on_start())
    }

    fn on_chunk_boxed(&self, chunk: Chunk) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.on_chunk(chunk))
    }

    fn on_error_boxed(&self, err: StreamError) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.on_error(err))
    }

    fn on_complete_boxed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.on_complete())
    }
}

/// `Stats()` snapshot (spec §4.5).
#[derive(Debug, Clone)]
pub struct MultiplexerStats {
    pub consumer_count: usize,
    pub active_consumers: usize,
    pub total_errors: u64,
    pub running: bool,
}

type SharedCallbacks = Arc<dyn ConsumerCallbacksBoxed>;

struct ConsumerEntry {
    queue: mpsc::Sender<Chunk>,
    /// Taken by whichever of `add_consumer` (if already running) or `start`
    /// (for consumers registered beforehand) first spawns this consumer's
    /// processor task.
    receiver: Mutex<Option<mpsc::Receiver<Chunk>>>,
    active: Arc<AtomicBool>,
    error_count: Arc<AtomicU64>,
    callbacks: SharedCallbacks,
}

/// A point-in-time copy of the broadcast-relevant parts of one consumer's
/// entry, cheap to clone since every field is a `Sender`/`Arc`.
type ConsumerSnapshot = (
    mpsc::Sender<Chunk>,
    Arc<AtomicBool>,
    Arc<AtomicU64>,
    SharedCallbacks,
);

/// Distributes one source `Reader`'s chunks to many independently-buffered
/// consumers (spec §4.5).
///
/// The broadcast task spawned by `start()` holds an `Arc` clone of
/// `consumers` itself rather than a frozen snapshot taken once at start
/// time, so `remove_consumer` dropping an entry's `Sender` is immediately
/// visible to the next chunk the broadcaster delivers — the consumer's
/// queue closes and its processor task ends promptly instead of leaking
/// until `close()` (spec §4.5 "RemoveConsumer... closes its queue"; §9
/// "Multiplexer goroutine join").
pub struct Multiplexer {
    consumers: Arc<Mutex<HashMap<u64, ConsumerEntry>>>,
    next_id: AtomicU64,
    running: AtomicBool,
    closed: AtomicBool,
    options: StreamOptions,
    shutdown: ShutdownSignal,
    tasks: Arc<tokio::sync::Mutex<JoinSet<()>>>,
}

/// Drains a local `JoinSet` of notifier tasks to completion, logging (not
/// propagating) any panics. Kept local to the broadcast loop rather than
/// routed through `Multiplexer::tasks`: that `Mutex` is also held across the
/// whole drain loop in `close()`, and spawning notifiers into it from inside
/// the broadcast task would deadlock against that drain (one side holds the
/// lock waiting on the other's `JoinHandle`, the other blocks taking the
/// lock to register itself).
async fn await_notifiers(mut notifiers: JoinSet<()>) {
    while let Some(result) = notifiers.join_next().await {
        if let Err(join_error) = result {
            tracing::warn!(%join_error, "multiplexer notifier task did not finish cleanly");
        }
    }
}

fn snapshot_consumers(consumers: &Mutex<HashMap<u64, ConsumerEntry>>) -> Vec<ConsumerSnapshot> {
    consumers
        .lock()
        .unwrap()
        .values()
        .map(|entry| {
            (
                entry.queue.clone(),
                Arc::clone(&entry.active),
                Arc::clone(&entry.error_count),
                Arc::clone(&entry.callbacks),
            )
        })
        .collect()
}

impl Multiplexer {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            consumers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            options,
            shutdown: ShutdownSignal::new(),
            tasks: Arc::new(tokio::sync::Mutex::new(JoinSet::new())),
        }
    }

    /// Registers a consumer and invokes its `on_start` immediately, rolling
    /// back registration if that fails (spec §4.5). Its per-consumer queue
    /// is sized to `options.buffer_size`.
    pub async fn add_consumer(
        &self,
        callbacks: SharedCallbacks,
    ) -> Result<u64, StreamError> {
        self.add_consumer_with_buffer(callbacks, self.options.buffer_size)
            .await
    }

    /// Like [`Self::add_consumer`], but with an explicit per-consumer queue
    /// size independent of `options.buffer_size` — useful to model a
    /// consumer that is known to be slower than its peers.
    pub async fn add_consumer_with_buffer(
        &self,
        callbacks: SharedCallbacks,
        buffer_size: usize,
    ) -> Result<u64, StreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::WriteClosed {
                component: Component::Multiplexer,
            });
        }

        {
            let consumers = self.consumers.lock().unwrap();
            if self.options.max_consumers > 0 && consumers.len() >= self.options.max_consumers {
                return Err(StreamError::Configuration {
                    component: Component::Multiplexer,
                    reason: format!("max_consumers ({}) reached", self.options.max_consumers),
                });
            }
        }

        callbacks.on_start_boxed().await?;

        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let active = Arc::new(AtomicBool::new(true));
        let error_count = Arc::new(AtomicU64::new(0));

        self.consumers.lock().unwrap().insert(
            id,
            ConsumerEntry {
                queue: tx,
                receiver: Mutex::new(Some(rx)),
                active: Arc::clone(&active),
                error_count: Arc::clone(&error_count),
                callbacks: Arc::clone(&callbacks),
            },
        );

        if self.running.load(Ordering::Acquire) {
            let rx = self
                .consumers
                .lock()
                .unwrap()
                .get(&id)
                .and_then(|entry| entry.receiver.lock().unwrap().take());
            if let Some(rx) = rx {
                self.spawn_processor(rx, callbacks, active, self.shutdown.clone())
                    .await;
            }
        }

        Ok(id)
    }

    async fn spawn_processor(
        &self,
        mut rx: mpsc::Receiver<Chunk>,
        callbacks: SharedCallbacks,
        active: Arc<AtomicBool>,
        shutdown: ShutdownSignal,
    ) {
        self.tasks.lock().await.spawn(async move {
            loop {
                tokio::select! {
                    chunk = rx.recv() => {
                        match chunk {
                            Some(chunk) if active.load(Ordering::Acquire) => {
                                callbacks.on_chunk_boxed(chunk).await;
                            }
                            Some(_) => continue,
                            None => break,
                        }
                    }
                    () = shutdown.cancelled() => break,
                }
            }
        });
    }

    /// Removes a consumer: disables its active flag and closes its queue by
    /// dropping the only sender this multiplexer holds for it.
    pub fn remove_consumer(&self, id: u64) {
        if let Some(entry) = self.consumers.lock().unwrap().remove(&id) {
            entry.active.store(false, Ordering::Release);
        }
    }

    /// Starts broadcasting from `source`. Single-shot (spec §4.5).
    pub async fn start(&self, mut source: Reader) -> Result<(), StreamError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(StreamError::Configuration {
                component: Component::Multiplexer,
                reason: "multiplexer already running".to_string(),
            });
        }

        // Spawn processor tasks for every consumer registered before start().
        let pending: Vec<_> = {
            let consumers = self.consumers.lock().unwrap();
            consumers
                .iter()
                .filter_map(|(_, entry)| {
                    entry
                        .receiver
                        .lock()
                        .unwrap()
                        .take()
                        .map(|rx| (rx, Arc::clone(&entry.callbacks), Arc::clone(&entry.active)))
                })
                .collect()
        };
        for (rx, callbacks, active) in pending {
            self.spawn_processor(rx, callbacks, active, self.shutdown.clone())
                .await;
        }

        let shutdown = self.shutdown.clone();
        let tasks = Arc::clone(&self.tasks);
        let consumers_for_loop = Arc::clone(&self.consumers);
        let enable_backpressure = self.options.enable_backpressure;
        let chunk_timeout = self.options.chunk_timeout;

        tasks.lock().await.spawn(async move {
            loop {
                let next = tokio::select! {
                    next = source.next() => next,
                    () = shutdown.cancelled() => break,
                };

                match next {
                    Ok(Some(chunk)) => {
                        let snapshot = snapshot_consumers(&consumers_for_loop);
                        for (queue, active, error_count, _) in snapshot {
                            if !active.load(Ordering::Acquire) {
                                continue;
                            }
                            // With backpressure enabled, a full consumer queue
                            // is drop-newest-and-count so one slow consumer
                            // never blocks the source or its peers (spec
                            // §4.5, §5). Without it, the broadcaster blocks on
                            // that consumer up to `chunk_timeout` (or
                            // indefinitely when it is zero) before counting an
                            // error and moving on — the spec's documented
                            // trade-off: isolation is opt-in (spec §4.5
                            // "Failure model"; spec §5 "Backpressure
                            // discipline").
                            let delivered = if enable_backpressure {
                                queue.try_send(chunk.clone()).is_ok()
                            } else if chunk_timeout.is_zero() {
                                queue.send(chunk.clone()).await.is_ok()
                            } else {
                                tokio::time::timeout(chunk_timeout, queue.send(chunk.clone()))
                                    .await
                                    .map(|r| r.is_ok())
                                    .unwrap_or(false)
                            };
                            if !delivered {
                                error_count.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                    Ok(None) => {
                        let snapshot = snapshot_consumers(&consumers_for_loop);
                        let mut notifiers = JoinSet::new();
                        for (_, active, _, callbacks) in snapshot {
                            if active.load(Ordering::Acquire) {
                                notifiers.spawn(async move {
                                    callbacks.on_complete_boxed().await;
                                });
                            }
                        }
                        await_notifiers(notifiers).await;
                        break;
                    }
                    Err(error) => {
                        let snapshot = snapshot_consumers(&consumers_for_loop);
                        let mut notifiers = JoinSet::new();
                        for (_, active, _, callbacks) in snapshot {
                            if active.load(Ordering::Acquire) {
                                let error = error.clone();
                                notifiers.spawn(async move {
                                    callbacks.on_error_boxed(error).await;
                                });
                            }
                        }
                        await_notifiers(notifiers).await;
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Idempotent-fail-on-second-call: cancels every task, closes every
    /// consumer queue, and awaits all spawned tasks before returning (spec
    /// §4.5, §9 "Multiplexer goroutine join").
    pub async fn close(&self) -> Result<(), StreamError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StreamError::Configuration {
                component: Component::Multiplexer,
                reason: "multiplexer already closed".to_string(),
            });
        }

        self.consumers.lock().unwrap().clear();
        self.shutdown.cancel();

        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(join_error) = result {
                tracing::warn!(%join_error, "multiplexer task did not finish cleanly");
            }
        }

        Ok(())
    }

    pub fn stats(&self) -> MultiplexerStats {
        let consumers = self.consumers.lock().unwrap();
        let active_consumers = consumers
            .values()
            .filter(|e| e.active.load(Ordering::Acquire))
            .count();
        let total_errors = consumers
            .values()
            .map(|e| e.error_count.load(Ordering::Relaxed))
            .sum();
        MultiplexerStats {
            consumer_count: consumers.len(),
            active_consumers,
            total_errors,
            running: self.running.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel;
    use std::sync::atomic::AtomicUsize;

    struct RecordingConsumer {
        chunks: Mutex<Vec<Chunk>>,
        completed: AtomicBool,
        errored: AtomicUsize,
    }

    impl RecordingConsumer {
        fn new() -> Self {
            Self {
                chunks: Mutex::new(Vec::new()),
                completed: AtomicBool::new(false),
                errored: AtomicUsize::new(0),
            }
        }
    }

    impl ConsumerCallbacks for RecordingConsumer {
        async fn on_start(&self) -> Result<(), StreamError> {
            Ok(())
        }

        async fn on_chunk(&self, chunk: Chunk) {
            self.chunks.lock().unwrap().push(chunk);
        }

        async fn on_error(&self, _err: StreamError) {
            self.errored.fetch_add(1, Ordering::Relaxed);
        }

        async fn on_complete(&self) {
            self.completed.store(true, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn fan_out_delivers_every_chunk_in_order_to_every_consumer() {
        let mux = Multiplexer::new(StreamOptions::default());
        let a = Arc::new(RecordingConsumer::new());
        let b = Arc::new(RecordingConsumer::new());
        mux.add_consumer(a.clone()).await.unwrap();
        mux.add_consumer(b.clone()).await.unwrap();

        let (writer, reader) = channel(StreamOptions::default());
        mux.start(reader).await.unwrap();

        for i in 0..5 {
            writer.write_text(format!("{i}")).await.unwrap();
        }
        writer.close().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        mux.close().await.unwrap();

        // 5 text chunks + 1 terminal control chunk each.
        assert_eq!(a.chunks.lock().unwrap().len(), 6);
        assert_eq!(b.chunks.lock().unwrap().len(), 6);
        assert!(a.completed.load(Ordering::Relaxed));
        assert!(b.completed.load(Ordering::Relaxed));
        assert_eq!(mux.stats().total_errors, 0);
    }

    /// A removed consumer stops being delivered chunks and drops out of
    /// `Stats().consumer_count` immediately, without waiting for
    /// `Multiplexer::close()` — the broadcast task reads `consumers` live
    /// rather than holding its own clone of every `Sender` for the whole
    /// run.
    #[tokio::test]
    async fn removed_consumer_stops_receiving_chunks() {
        let mux = Multiplexer::new(StreamOptions::default());
        let keep = Arc::new(RecordingConsumer::new());
        let drop_me = Arc::new(RecordingConsumer::new());
        let drop_id = mux.add_consumer(drop_me.clone()).await.unwrap();
        mux.add_consumer(keep.clone()).await.unwrap();

        let (writer, reader) = channel(StreamOptions::default());
        mux.start(reader).await.unwrap();

        writer.write_text("before").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        mux.remove_consumer(drop_id);
        assert_eq!(mux.stats().consumer_count, 1);

        writer.write_text("after").await.unwrap();
        writer.close().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        mux.close().await.unwrap();

        // `keep` sees both text chunks plus the terminal.
        assert_eq!(keep.chunks.lock().unwrap().len(), 3);
        // `drop_me` only ever saw the one chunk delivered before removal.
        assert_eq!(drop_me.chunks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_fail_on_second_call() {
        let mux = Multiplexer::new(StreamOptions::default());
        mux.close().await.unwrap();
        let err = mux.close().await.unwrap_err();
        assert!(matches!(err, StreamError::Configuration { .. }));
    }

    struct SlowConsumer {
        delay: std::time::Duration,
        received: AtomicUsize,
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

    /// Scenario 5 (spec §8): a fast consumer with ample buffer sees every
    /// chunk while a slow consumer with a tiny buffer drops some — and the
    /// slow consumer never blocks the fast one or the source.
    #[tokio::test]
    async fn backpressure_enabled_drops_for_a_slow_consumer_without_blocking_a_fast_one() {
        let options = StreamOptions::default()
            .with_buffer_size(1000)
            .with_enable_backpressure(true);
        let mux = Multiplexer::new(options.clone());

        let fast = Arc::new(RecordingConsumer::new());
        let slow = Arc::new(SlowConsumer {
            delay: std::time::Duration::from_millis(10),
            received: AtomicUsize::new(0),
        });

        mux.add_consumer(fast.clone()).await.unwrap();
        // The slow consumer's per-consumer queue is sized independently from
        // the broadcaster's input buffer; size it tiny so it backs up fast
        // against its own 10ms-per-chunk processing rate.
        mux.add_consumer_with_buffer(slow.clone(), 5).await.unwrap();

        let (writer, reader) = channel(options);
        mux.start(reader).await.unwrap();

        for i in 0..200 {
            writer.write_text(format!("{i}")).await.unwrap();
        }
        writer.close().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        mux.close().await.unwrap();

        // The fast consumer sees every chunk plus the terminal sentinel.
        assert_eq!(fast.chunks.lock().unwrap().len(), 201);
        // The slow consumer fell behind: it received fewer than were sent,
        // and the multiplexer counted an error for every drop.
        assert!(slow.received.load(Ordering::Relaxed) < 201);
        assert!(mux.stats().total_errors > 0);
    }
}
