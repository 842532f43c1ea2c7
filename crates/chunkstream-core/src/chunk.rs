//! The typed unit of streamed data (spec §3: Chunk & Metadata).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// The wire-level type tag of a [`Chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Text,
    Binary,
    Json,
    Progress,
    Status,
    Error,
    Control,
}

/// The error payload carried by an `Error`-typed chunk.
///
/// Kept as a plain string rather than `StreamError` so that a chunk can
/// be serialized and travel across a transport boundary (spec §6) without
/// requiring the receiving side to share this crate's error enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkError {
    pub message: String,
}

impl ChunkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ChunkError {}

/// Embedded metadata record (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Monotone sequence number, assigned by the `Writer`, starting at 1.
    pub sequence: u64,
    /// Milliseconds since the Unix epoch, assigned by the `Writer`.
    pub timestamp: u64,
    /// 0.0–100.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Estimated time to completion, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Open key-value extension bag.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub(crate) fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// The unit of streamed data (spec §3).
///
/// Chunks are conceptually immutable once emitted: a consumer that wants
/// to hold on to one past the current iteration of a handler must clone
/// it (see [`crate::pool::ObjectPool`] for the allocator that reuses
/// instances between emissions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
    pub is_last: bool,
    pub metadata: Metadata,
}

impl Chunk {
    /// A fresh, unsequenced chunk of the given type. Used by
    /// [`crate::pool::ObjectPool`] and by callers building a chunk before
    /// handing it to a `Writer`, which is the only place `sequence` and
    /// `timestamp` are ever assigned.
    pub fn new(chunk_type: ChunkType) -> Self {
        Self {
            chunk_type,
            text: None,
            data: None,
            error: None,
            is_last: false,
            metadata: Metadata::default(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(ChunkType::Text)
        }
    }

    pub fn binary(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(ChunkType::Binary)
        }
    }

    pub fn json(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(ChunkType::Json)
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        let status = status.into();
        let mut chunk = Self::new(ChunkType::Status);
        chunk.metadata.status = Some(status);
        chunk
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        let mut chunk = Self::new(ChunkType::Error);
        chunk.error = Some(ChunkError::new(err.to_string()));
        chunk
    }

    pub fn progress(progress: f64, message: Option<String>) -> Self {
        let mut chunk = Self::new(ChunkType::Progress);
        chunk.metadata.progress = Some(progress.clamp(0.0, 100.0));
        chunk.metadata.status = message;
        chunk
    }

    /// The terminal sentinel: a `Control` chunk with `is_last = true`.
    pub fn terminal() -> Self {
        let mut chunk = Self::new(ChunkType::Control);
        chunk.is_last = true;
        chunk
    }

    /// Approximate byte footprint used by `Collect`/`CollectText` to
    /// enforce `max_collect_size` (spec §4.4): payload bytes plus a
    /// fixed per-chunk overhead for the metadata record.
    pub fn approx_size(&self) -> usize {
        const PER_CHUNK_OVERHEAD: usize = 256;
        let text_len = self.text.as_ref().map_or(0, String::len);
        let data_len = self
            .data
            .as_ref()
            .map(|v| serde_json::to_vec(v).map(|b| b.len()).unwrap_or(0))
            .unwrap_or(0);
        text_len + data_len + PER_CHUNK_OVERHEAD
    }

    /// Resets every field to the state a pooled instance must be in
    /// before reuse (spec §4.1). Sequence numbers are never touched here:
    /// only the `Writer` assigns them.
    pub(crate) fn reset(&mut self, chunk_type: ChunkType) {
        self.chunk_type = chunk_type;
        self.text = None;
        self.data = None;
        self.error = None;
        self.is_last = false;
        self.metadata = Metadata::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_is_lossless() {
        let mut chunk = Chunk::text("hello");
        chunk.metadata.sequence = 7;
        chunk.metadata.extra.insert("k".into(), Value::from(1));

        let encoded = serde_json::to_string(&chunk).unwrap();
        let decoded: Chunk = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.chunk_type, ChunkType::Text);
        assert_eq!(decoded.text.as_deref(), Some("hello"));
        assert_eq!(decoded.metadata.sequence, 7);
        assert_eq!(decoded.metadata.extra.get("k"), Some(&Value::from(1)));
    }

    #[test]
    fn terminal_chunk_is_control_and_last() {
        let chunk = Chunk::terminal();
        assert_eq!(chunk.chunk_type, ChunkType::Control);
        assert!(chunk.is_last);
    }

    #[test]
    fn progress_clamps_to_0_100() {
        let over = Chunk::progress(150.0, None);
        let under = Chunk::progress(-10.0, None);
        assert_eq!(over.metadata.progress, Some(100.0));
        assert_eq!(under.metadata.progress, Some(0.0));
    }

    #[test]
    fn approx_size_counts_overhead() {
        let chunk = Chunk::text("abc");
        assert_eq!(chunk.approx_size(), 3 + 256);
    }
}
