//! Demonstration of chunkstream features.
//!
//! Run with: `cargo run -p chunkstream --bin demo`

use chunkstream::{channel, operators, ConsumerCallbacks, Multiplexer, ProgressTracker, StreamError, StreamOptions};
use chunkstream_core::Chunk;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== chunkstream Demo ===\n");

    demo_basic_usage().await?;
    demo_operators_pipeline().await?;
    demo_fan_out().await?;
    demo_progress_tracker().await?;
    demo_configuration_presets().await?;

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: Basic Writer/Reader pair, CollectText.
async fn demo_basic_usage() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 1: Basic Usage ---");

    let (writer, mut reader) = channel(StreamOptions::default());

    let producer = tokio::spawn(async move {
        writer.write_text("hello, ").await.unwrap();
        writer.write_text("world").await.unwrap();
        writer.close().await.unwrap();
    });

    let partial = reader.collect_text().await;
    producer.await?;

    println!("  Collected text: {:?}", partial.value);
    println!("  ✓ Basic usage complete\n");
    Ok(())
}

/// Demo 2: An operator pipeline — filter, map, batch.
async fn demo_operators_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 2: Operator Pipeline ---");

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
        writer.write_text(word).await?;
    }
    writer.close().await?;

    let partial = batched.collect().await;
    println!("  Produced {} batch/control chunks", partial.value.len());
    println!("  ✓ Operator pipeline complete\n");
    Ok(())
}

struct PrintingConsumer {
    name: &'static str,
    seen: Mutex<Vec<String>>,
}

impl ConsumerCallbacks for PrintingConsumer {
    async fn on_start(&self) -> Result<(), StreamError> {
        println!("  [{}] started", self.name);
        Ok(())
    }

    async fn on_chunk(&self, chunk: Chunk) {
        if let Some(text) = &chunk.text {
            self.seen.lock().unwrap().push(text.clone());
        }
    }

    async fn on_error(&self, err: StreamError) {
        println!("  [{}] error: {err}", self.name);
    }

    async fn on_complete(&self) {
        println!("  [{}] complete, saw {:?}", self.name, self.seen.lock().unwrap());
    }
}

/// Demo 3: Fan-out via the Multiplexer.
async fn demo_fan_out() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 3: Fan-out Broadcast ---");

    let mux = Multiplexer::new(StreamOptions::default());
    let a = Arc::new(PrintingConsumer {
        name: "A",
        seen: Mutex::new(Vec::new()),
    });
    let b = Arc::new(PrintingConsumer {
        name: "B",
        seen: Mutex::new(Vec::new()),
    });
    mux.add_consumer(a).await?;
    mux.add_consumer(b).await?;

    let (writer, reader) = channel(StreamOptions::default());
    mux.start(reader).await?;

    for i in 0..3 {
        writer.write_text(format!("chunk-{i}")).await?;
    }
    writer.close().await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = mux.stats();
    mux.close().await?;

    println!(
        "  stats: consumers={}, active={}, errors={}",
        stats.consumer_count, stats.active_consumers, stats.total_errors
    );
    println!("  ✓ Fan-out broadcast complete\n");
    Ok(())
}

/// Demo 4: ProgressTracker ETA reporting.
async fn demo_progress_tracker() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 4: Progress Tracker ---");

    let (writer, mut reader) = channel(StreamOptions::default());
    let total = 5u64;

    let producer = tokio::spawn(async move {
        let tracker = ProgressTracker::new(&writer, total);
        for _ in 0..total {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tracker.increment(1).await.unwrap();
        }
        writer.close().await.unwrap();
    });

    let seen = Arc::new(AtomicUsize::new(0));
    loop {
        match reader.next().await {
            Ok(Some(chunk)) if chunk.is_last => break,
            Ok(Some(chunk)) => {
                seen.fetch_add(1, Ordering::Relaxed);
                println!(
                    "  progress={:?}% eta={:?}ms",
                    chunk.metadata.progress, chunk.metadata.eta
                );
            }
            _ => break,
        }
    }

    producer.await?;
    println!("  ✓ Progress tracker complete\n");
    Ok(())
}

/// Demo 5: Named configuration presets.
async fn demo_configuration_presets() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 5: Configuration Presets ---");

    let low_latency = StreamOptions::low_latency();
    println!(
        "  low_latency: buffer_size={}, chunk_timeout={:?}",
        low_latency.buffer_size, low_latency.chunk_timeout
    );

    let high_throughput = StreamOptions::high_throughput();
    println!(
        "  high_throughput: buffer_size={}, chunk_timeout={:?}",
        high_throughput.buffer_size, high_throughput.chunk_timeout
    );

    println!("  ✓ Configuration presets complete\n");
    Ok(())
}
