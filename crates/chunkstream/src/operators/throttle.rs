//! `Throttle(maxPerSec)` and its alias `RateLimit` (spec §4.6).
//!
//! Grounded on `span_collector::rate_limiter::IntervalRateLimiter`: a
//! single `tokio::time::Interval` with `MissedTickBehavior::Skip`, reused
//! across iterations so the operator never allocates a new timer per chunk
//! (spec §9).

use super::output_channel;
use crate::reader::Reader;
use chunkstream_core::StreamOptions;
use tokio::time::{interval, MissedTickBehavior};

/// Enforces `minDelay = 1s / max_per_sec` between outgoing (non-terminal)
/// chunks.
///
/// # Panics
///
/// Panics if `max_per_sec` is not positive.
pub fn throttle(mut source: Reader, options: StreamOptions, max_per_sec: f64) -> Reader {
    assert!(max_per_sec > 0.0, "max_per_sec must be positive");
    let (writer, reader) = output_channel(options);
    let period = std::time::Duration::from_secs_f64(1.0 / max_per_sec);

    tokio::spawn(async move {
        let mut ticker = interval(period.max(std::time::Duration::from_micros(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick always fires immediately; consume it up front so
        // the first chunk isn't delayed.
        ticker.tick().await;

        loop {
            match source.next().await {
                // Swallow the source's own terminal; `close()` below emits
                // the one true terminal for this operator's output stream.
                Ok(Some(chunk)) if chunk.is_last => break,
                Ok(Some(chunk)) => {
                    ticker.tick().await;
                    if writer.write_chunk(chunk).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
        let _ = writer.close().await;
    });

    reader
}

/// Alias for [`throttle`] with a per-second rate (spec §4.6: "RateLimit —
/// alias for Throttle with a per-second rate").
pub fn rate_limit(source: Reader, options: StreamOptions, per_sec: f64) -> Reader {
    throttle(source, options, per_sec)
}
