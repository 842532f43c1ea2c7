//! Multi-mode event bus: a typed multi-channel dispatcher routing events by
//! category (spec §4.7).
//!
//! Each active mode gets its own bounded channel, sized and isolated the
//! same way a multiplexer consumer's queue is (spec §4.5) — a full mode
//! channel fails the emitter rather than blocking it, so one noisy mode can
//! never back up another.

use chunkstream_core::{Chunk, Component, StreamError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A named category of events, each with its own channel and subscribers
/// (spec GLOSSARY: "Mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Messages,
    Updates,
    Custom,
    Values,
    Debug,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Messages => "messages",
            Self::Updates => "updates",
            Self::Custom => "custom",
            Self::Values => "values",
            Self::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// A receive handle for one mode's channel, or for a merged set of modes
/// (see [`EventBus::subscribe_all`]).
pub struct EventStream {
    rx: mpsc::Receiver<Chunk>,
}

impl EventStream {
    pub async fn next(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }
}

/// A typed emission handle bound to one mode (spec §4.7: `GetWriter(mode)`).
pub struct EventWriter<'a> {
    bus: &'a EventBus,
    mode: Mode,
}

impl EventWriter<'_> {
    pub fn emit(&self, event: Chunk) -> Result<(), StreamError> {
        self.bus.stream(self.mode, event)
    }
}

/// A typed multi-channel event dispatcher (spec §4.7).
pub struct EventBus {
    senders: Mutex<HashMap<Mode, mpsc::Sender<Chunk>>>,
    receivers: Mutex<HashMap<Mode, Option<mpsc::Receiver<Chunk>>>>,
    buffer_size: usize,
}

impl EventBus {
    /// Configures one bounded channel of `buffer_size` per entry in `modes`.
    /// Modes outside this set are rejected by every operation with
    /// `Configuration`.
    pub fn new(modes: impl IntoIterator<Item = Mode>, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for mode in modes {
            let (tx, rx) = mpsc::channel(buffer_size);
            senders.insert(mode, tx);
            receivers.insert(mode, Some(rx));
        }
        Self {
            senders: Mutex::new(senders),
            receivers: Mutex::new(receivers),
            buffer_size,
        }
    }

    /// Non-blocking emission (spec §4.7): `Configuration` if the mode isn't
    /// active, `Network` if the mode's channel is currently full.
    pub fn stream(&self, mode: Mode, event: Chunk) -> Result<(), StreamError> {
        let senders = self.senders.lock().unwrap();
        let sender = senders.get(&mode).ok_or_else(|| StreamError::Configuration {
            component: Component::EventBus,
            reason: format!("mode {mode} is not configured"),
        })?;
        sender.try_send(event).map_err(|_| StreamError::Network {
            component: Component::EventBus,
            detail: format!("{mode} channel full"),
        })
    }

    /// Returns the receive end of `mode`'s channel. Each mode supports
    /// exactly one subscriber; a second call fails with `Configuration`.
    pub fn subscribe(&self, mode: Mode) -> Result<EventStream, StreamError> {
        let mut receivers = self.receivers.lock().unwrap();
        let slot = receivers.get_mut(&mode).ok_or_else(|| StreamError::Configuration {
            component: Component::EventBus,
            reason: format!("mode {mode} is not configured"),
        })?;
        let rx = slot.take().ok_or_else(|| StreamError::Configuration {
            component: Component::EventBus,
            reason: format!("mode {mode} already has a subscriber"),
        })?;
        Ok(EventStream { rx })
    }

    /// A merged stream of every mode that still has an unclaimed receiver
    /// (spec §4.7: `SubscribeAll()`). Each mode keeps its own forwarding
    /// task, the same one-task-per-input shape as [`crate::operators::merge`].
    pub fn subscribe_all(&self) -> EventStream {
        let taken: Vec<mpsc::Receiver<Chunk>> = {
            let mut receivers = self.receivers.lock().unwrap();
            receivers.values_mut().filter_map(Option::take).collect()
        };

        let (tx, rx) = mpsc::channel(self.buffer_size);
        if taken.is_empty() {
            return EventStream { rx };
        }

        let remaining = Arc::new(AtomicUsize::new(taken.len()));
        for mut mode_rx in taken {
            let tx = tx.clone();
            let remaining = Arc::clone(&remaining);
            tokio::spawn(async move {
                while let Some(event) = mode_rx.recv().await {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                remaining.fetch_sub(1, Ordering::AcqRel);
            });
        }
        drop(tx);

        EventStream { rx }
    }

    /// A typed helper for emitting into one mode (spec §4.7: `GetWriter`).
    pub fn get_writer(&self, mode: Mode) -> Result<EventWriter<'_>, StreamError> {
        if !self.senders.lock().unwrap().contains_key(&mode) {
            return Err(StreamError::Configuration {
                component: Component::EventBus,
                reason: format!("mode {mode} is not configured"),
            });
        }
        Ok(EventWriter { bus: self, mode })
    }

    /// Closes every mode channel. Idempotent.
    pub fn close(&self) {
        self.senders.lock().unwrap().clear();
    }
}

/// A predicate-based filter over an [`EventStream`] (spec §4.7: filters
/// `{modes?, types?, predicate?}`).
pub fn filter<F>(mut stream: EventStream, predicate: F) -> EventStream
where
    F: Fn(&Chunk) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            if predicate(&event) && tx.send(event).await.is_err() {
                break;
            }
        }
    });
    EventStream { rx }
}

/// Applies `f` to every event on an [`EventStream`] (spec §4.7: transforms
/// `event -> event`).
pub fn transform<F>(mut stream: EventStream, f: F) -> EventStream
where
    F: Fn(Chunk) -> Chunk + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            if tx.send(f(event)).await.is_err() {
                break;
            }
        }
    });
    EventStream { rx }
}

/// Merges the same mode across multiple bus instances (spec §4.7:
/// "Aggregators merge the same mode across multiple bus instances").
pub fn aggregate(buses: &[&EventBus], mode: Mode) -> Result<EventStream, StreamError> {
    let streams = buses
        .iter()
        .map(|bus| bus.subscribe(mode))
        .collect::<Result<Vec<_>, _>>()?;

    let (tx, rx) = mpsc::channel(32);
    if streams.is_empty() {
        return Ok(EventStream { rx });
    }

    let remaining = Arc::new(AtomicUsize::new(streams.len()));
    for mut stream in streams {
        let tx = tx.clone();
        let remaining = Arc::clone(&remaining);
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            remaining.fetch_sub(1, Ordering::AcqRel);
        });
    }
    drop(tx);

    Ok(EventStream { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkstream_core::Chunk;

    #[tokio::test]
    async fn stream_to_unconfigured_mode_fails_with_configuration() {
        let bus = EventBus::new([Mode::Messages], 4);
        let err = bus.stream(Mode::Updates, Chunk::text("x")).unwrap_err();
        assert!(matches!(err, StreamError::Configuration { .. }));
    }

    #[tokio::test]
    async fn full_mode_channel_fails_with_network_without_blocking() {
        let bus = EventBus::new([Mode::Messages], 1);
        bus.stream(Mode::Messages, Chunk::text("a")).unwrap();
        let err = bus.stream(Mode::Messages, Chunk::text("b")).unwrap_err();
        assert!(matches!(err, StreamError::Network { .. }));
    }

    #[tokio::test]
    async fn subscribe_all_merges_every_active_mode() {
        let bus = EventBus::new([Mode::Messages, Mode::Updates], 8);
        bus.stream(Mode::Messages, Chunk::text("m")).unwrap();
        bus.stream(Mode::Updates, Chunk::text("u")).unwrap();

        let mut merged = bus.subscribe_all();
        let mut seen = Vec::new();
        seen.push(merged.next().await.unwrap().text.unwrap());
        seen.push(merged.next().await.unwrap().text.unwrap());
        seen.sort();
        assert_eq!(seen, vec!["m".to_string(), "u".to_string()]);
    }

    #[tokio::test]
    async fn get_writer_emits_into_its_bound_mode() {
        let bus = EventBus::new([Mode::Values], 4);
        let writer = bus.get_writer(Mode::Values).unwrap();
        writer.emit(Chunk::text("v")).unwrap();

        let mut stream = bus.subscribe(Mode::Values).unwrap();
        assert_eq!(stream.next().await.unwrap().text.as_deref(), Some("v"));
    }
}
