//! Core types for the chunk stream runtime: the typed [`Chunk`] unit,
//! the [`ring::RingBuffer`] used for replay and per-consumer queues, the
//! [`pool::ObjectPool`] chunk allocator, [`config::StreamOptions`], and
//! the crate-wide [`error::StreamError`].
//!
//! This crate has no async runtime dependency: it is the set of plain
//! data types and synchronization-free-at-the-API-level primitives that
//! `chunkstream` builds the Writer/Reader/Multiplexer/operators on top
//! of, mirroring how `ringmpsc-rs` underlies `ringmpsc-stream` in the
//! teacher pack.

pub mod chunk;
pub mod config;
pub mod error;
pub mod pool;
pub mod ring;

pub use chunk::{Chunk, ChunkError, ChunkType, Metadata};
pub use config::StreamOptions;
pub use error::{Component, StreamError};
pub use pool::ObjectPool;
pub use ring::RingBuffer;
