//! Stream options recognized by `Writer`, `Reader`, and `Multiplexer`
//! (spec §3). Builder-style, `Default`-backed configuration, the shape
//! used throughout the teacher pack for `StreamConfig`/`BatchConfig`/
//! `RetryConfig`.

use std::time::Duration;

/// Configuration recognized by `Writer`, `Reader`, and `Multiplexer`.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Capacity of the internal bounded channel.
    pub buffer_size: usize,
    /// Per-chunk read/write deadline; `Duration::ZERO` disables it.
    pub chunk_timeout: Duration,
    /// Wall-clock deadline for the whole stream; `Duration::ZERO` disables it.
    pub stream_timeout: Duration,
    /// Enable the Reader's ring-buffer replay.
    pub enable_buffer: bool,
    /// Capacity of the Reader's replay ring buffer, when `enable_buffer`.
    pub replay_buffer_size: usize,
    /// When a multiplexer consumer queue is full, drop-newest and count
    /// an error instead of blocking the broadcaster.
    pub enable_backpressure: bool,
    /// Retry a Reader's `Next()` after an Error chunk.
    pub retry_on_error: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Hard upper bound in bytes for `Collect`/`CollectText`.
    pub max_collect_size: usize,
    /// Upper bound on Multiplexer fan-out; `0` means unlimited.
    pub max_consumers: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            chunk_timeout: Duration::ZERO,
            stream_timeout: Duration::ZERO,
            enable_buffer: false,
            replay_buffer_size: 64,
            enable_backpressure: false,
            retry_on_error: false,
            max_retries: 0,
            retry_delay: Duration::from_millis(100),
            max_collect_size: 100 * 1024 * 1024,
            max_consumers: 0,
        }
    }
}

impl StreamOptions {
    /// Small buffer, short timeouts, tuned for interactive latency.
    pub fn low_latency() -> Self {
        Self {
            buffer_size: 16,
            chunk_timeout: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Large buffer, generous timeouts, tuned for bulk throughput.
    pub fn high_throughput() -> Self {
        Self {
            buffer_size: 4096,
            chunk_timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }

    pub fn with_buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n;
        self
    }

    pub fn with_chunk_timeout(mut self, d: Duration) -> Self {
        self.chunk_timeout = d;
        self
    }

    pub fn with_stream_timeout(mut self, d: Duration) -> Self {
        self.stream_timeout = d;
        self
    }

    pub fn with_enable_buffer(mut self, enable: bool) -> Self {
        self.enable_buffer = enable;
        self
    }

    pub fn with_replay_buffer_size(mut self, n: usize) -> Self {
        self.replay_buffer_size = n;
        self
    }

    pub fn with_enable_backpressure(mut self, enable: bool) -> Self {
        self.enable_backpressure = enable;
        self
    }

    pub fn with_retry_on_error(mut self, max_retries: u32, delay: Duration) -> Self {
        self.retry_on_error = true;
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_max_collect_size(mut self, bytes: usize) -> Self {
        self.max_collect_size = bytes;
        self
    }

    pub fn with_max_consumers(mut self, n: usize) -> Self {
        self.max_consumers = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = StreamOptions::default();
        assert_eq!(opts.buffer_size, 100);
        assert_eq!(opts.chunk_timeout, Duration::ZERO);
        assert_eq!(opts.max_collect_size, 100 * 1024 * 1024);
    }

    #[test]
    fn builder_chains_apply() {
        let opts = StreamOptions::default()
            .with_buffer_size(8)
            .with_chunk_timeout(Duration::from_millis(50));
        assert_eq!(opts.buffer_size, 8);
        assert_eq!(opts.chunk_timeout, Duration::from_millis(50));
    }
}
