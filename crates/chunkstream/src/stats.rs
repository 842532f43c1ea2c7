//! Statistics snapshots exposed by [`crate::writer::Writer`] and
//! [`crate::reader::Reader`] (spec §4.3, §4.4).

use std::time::{Duration, Instant};

/// A Reader's lifecycle state (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Running,
    Paused,
    Complete,
    Error,
    Closed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Closed)
    }
}

/// Point-in-time snapshot of a [`crate::writer::Writer`]'s counters.
#[derive(Debug, Clone)]
pub struct WriterStats {
    pub chunks_written: u64,
    pub bytes_written: u64,
    pub error_count: u64,
    pub start_time: Instant,
    pub last_write: Option<Instant>,
}

impl WriterStats {
    pub(crate) fn new() -> Self {
        Self {
            chunks_written: 0,
            bytes_written: 0,
            error_count: 0,
            start_time: Instant::now(),
            last_write: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Point-in-time snapshot of a [`crate::reader::Reader`]'s counters
/// (spec §4.4: `Status()`).
#[derive(Debug, Clone)]
pub struct ReaderStats {
    pub state: StreamState,
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub error_count: u64,
    pub elapsed: Duration,
    pub last_error: Option<String>,
    /// Derived from the last chunk's `current`/`total`, when present.
    pub progress: Option<f64>,
}
