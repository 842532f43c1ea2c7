//! Error kinds shared by every layer of the chunk stream runtime.

use thiserror::Error;

/// The component that raised a [`StreamError`], for logging and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Writer,
    Reader,
    Multiplexer,
    Operator,
    EventBus,
    Transport,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Writer => "writer",
            Self::Reader => "reader",
            Self::Multiplexer => "multiplexer",
            Self::Operator => "operator",
            Self::EventBus => "event_bus",
            Self::Transport => "transport",
        };
        f.write_str(s)
    }
}

/// Errors produced by the chunk stream runtime.
///
/// Every variant names the kind from spec §7 and carries whatever
/// contextual payload (component, operation, relevant parameter) is
/// useful for logging or dispatch at the call site.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// Writer operation attempted after `close()`.
    #[error("{component}: write after close")]
    WriteClosed { component: Component },

    /// Reader operation attempted after `close()`.
    #[error("{component}: read after close")]
    ReadClosed { component: Component },

    /// `Collect`/`CollectText`/text-accumulation hit `max_collect_size`.
    #[error("{component}: collected {collected} bytes, limit is {limit}")]
    SizeLimitExceeded {
        component: Component,
        collected: usize,
        limit: usize,
    },

    /// `chunk_timeout` elapsed on a send or receive.
    #[error("{component}: {operation} timed out after {elapsed_ms}ms")]
    Timeout {
        component: Component,
        operation: &'static str,
        elapsed_ms: u64,
    },

    /// The governing context/token was cancelled.
    #[error("{component}: cancelled during {operation}")]
    Cancelled {
        component: Component,
        operation: &'static str,
    },

    /// Invalid options, unknown mode, max-consumers exceeded, unknown
    /// fusion strategy, and similar misconfiguration.
    #[error("{component}: configuration error: {reason}")]
    Configuration {
        component: Component,
        reason: String,
    },

    /// Transport adapter or multiplexer consumer buffer is full.
    #[error("{component}: network buffer full ({detail})")]
    Network { component: Component, detail: String },

    /// A transform function returned an error.
    #[error("{component}: transform failed: {reason}")]
    Transform { component: Component, reason: String },

    /// A wrapped error from an external collaborator (LLM client, I/O, …).
    #[error("{component}: external error: {source_message}")]
    External {
        component: Component,
        source_message: String,
    },
}

impl StreamError {
    /// The component that raised this error.
    pub fn component(&self) -> Component {
        match self {
            Self::WriteClosed { component }
            | Self::ReadClosed { component }
            | Self::SizeLimitExceeded { component, .. }
            | Self::Timeout { component, .. }
            | Self::Cancelled { component, .. }
            | Self::Configuration { component, .. }
            | Self::Network { component, .. }
            | Self::Transform { component, .. }
            | Self::External { component, .. } => *component,
        }
    }

    /// `true` for errors that a caller may reasonably retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network { .. })
    }

    /// `true` for errors after which the stream will never produce more data.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::WriteClosed { .. } | Self::ReadClosed { .. } | Self::Cancelled { .. }
        )
    }

    pub(crate) fn external(component: Component, err: impl std::fmt::Display) -> Self {
        Self::External {
            component,
            source_message: err.to_string(),
        }
    }
}
